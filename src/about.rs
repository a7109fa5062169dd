pub const GENTLE_ASSEMBLY_DISPLAY_VERSION: &str = env!("GENTLE_ASSEMBLY_DISPLAY_VERSION");
pub const GENTLE_ASSEMBLY_BUILD_N: &str = env!("GENTLE_ASSEMBLY_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "gentle_assembly {}\nBuild {}\nCost-driven assembly planning for DNA construct batches",
        GENTLE_ASSEMBLY_DISPLAY_VERSION, GENTLE_ASSEMBLY_BUILD_N
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_text_names_build() {
        let text = version_cli_text();
        assert!(text.starts_with("gentle_assembly "));
        assert!(text.contains(GENTLE_ASSEMBLY_BUILD_N));
    }
}
