use crate::{LangError, SupportedLanguage};
use std::path::Path;
use tree_sitter::{Parser, Tree};

pub fn parser_for(lang: SupportedLanguage) -> Result<Parser, LangError> {
    let mut parser = Parser::new();
    parser
        .set_language(&lang.ts_language())
        .map_err(|_| LangError::IncompatibleGrammar(lang))?;
    Ok(parser)
}

/// Language of `path`, judged by extension (case-insensitive).
pub fn detect_language(path: &Path) -> Result<SupportedLanguage, LangError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("java") => Ok(SupportedLanguage::Java),
        _ => Err(LangError::NotJava(path.display().to_string())),
    }
}

/// Parse Java source. `None` means the parser gave up.
pub fn parse_java(source: &str) -> Result<Option<Tree>, LangError> {
    Ok(parser_for(SupportedLanguage::Java)?.parse(source, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(
            detect_language(Path::new("src/main/java/com/acme/App.java")).unwrap(),
            SupportedLanguage::Java
        );
        assert!(detect_language(Path::new("Legacy.JAVA")).is_ok());
        assert!(matches!(
            detect_language(Path::new("build.gradle")),
            Err(LangError::NotJava(_))
        ));
        assert!(detect_language(Path::new("README")).is_err());
    }

    #[test]
    fn test_parse_java() {
        let tree = parse_java("class A { int x = 1; }").unwrap().unwrap();
        assert_eq!(tree.root_node().kind(), "program");
        assert!(!tree.root_node().has_error());
    }
}
