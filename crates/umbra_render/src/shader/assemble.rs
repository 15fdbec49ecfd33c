//! Sentinel splicing of fragments into a stage template.

use thiserror::Error;

use super::library::FragmentSet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("no fragment named '{0}' in the library")]
    UnknownFragment(String),

    #[error("template has no '{sentinel}' sentinel for fragment '{fragment}'")]
    MissingSentinel { fragment: String, sentinel: String },
}

/// Splice `names` into `template`, in order.
///
/// A fragment's declarations replace the first `//[DEFS_NAME]` and its
/// computation replaces the first `//[CALC_NAME]`. Empty parts need no
/// sentinel. The result is whitespace-normalized, so templates that differ
/// only in indentation or blank lines assemble to the same text.
pub fn assemble(template: &str, names: &[&str], fragments: &FragmentSet) -> Result<String, AssemblyError> {
    let mut source = template.to_string();

    for name in names {
        let fragment = fragments
            .get(name)
            .ok_or_else(|| AssemblyError::UnknownFragment(name.to_string()))?;

        splice(&mut source, name, "DEFS", fragment.declarations)?;
        splice(&mut source, name, "CALC", fragment.computation)?;
    }

    Ok(normalize_whitespace(&source))
}

fn splice(source: &mut String, name: &str, prefix: &str, text: &str) -> Result<(), AssemblyError> {
    if text.trim().is_empty() {
        return Ok(());
    }

    let sentinel = format!("//[{}_{}]", prefix, name);
    match source.find(&sentinel) {
        Some(start) => {
            source.replace_range(start..start + sentinel.len(), text);
            Ok(())
        }
        None => Err(AssemblyError::MissingSentinel {
            fragment: name.to_string(),
            sentinel,
        }),
    }
}

/// Trim every line and drop the empty ones.
pub fn normalize_whitespace(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::library::{Fragment, FragmentLibrary, ShaderFamily, Stage};

    fn fragments() -> FragmentSet {
        let mut set = FragmentSet::new();
        set.insert("FOG", Fragment::new("var<private> fog: f32 = 0.5;", "color = color * fog;"));
        set.insert("TINT", Fragment::new("", "color = color + 0.1;"));
        set
    }

    const TEMPLATE: &str = "
//[DEFS_FOG]
fn main() {
    var color = 1.0;
    //[CALC_FOG]
    //[CALC_TINT]
}
";

    #[test]
    fn test_splices_declarations_and_computation() {
        let source = assemble(TEMPLATE, &["FOG", "TINT"], &fragments()).unwrap();

        assert!(source.contains("var<private> fog: f32 = 0.5;"));
        assert!(source.contains("color = color * fog;"));
        assert!(source.contains("color = color + 0.1;"));
        assert!(!source.contains("//[DEFS_FOG]"));
        assert!(!source.contains("//[CALC_FOG]"));
        assert!(!source.contains("//[CALC_TINT]"));
    }

    #[test]
    fn test_unlisted_sentinels_stay_put() {
        let source = assemble(TEMPLATE, &["TINT"], &fragments()).unwrap();
        assert!(source.contains("//[CALC_FOG]"));
        assert!(!source.contains("fog: f32"));
    }

    #[test]
    fn test_unknown_fragment() {
        let err = assemble(TEMPLATE, &["SMOKE"], &fragments()).unwrap_err();
        assert_eq!(err, AssemblyError::UnknownFragment("SMOKE".to_string()));
    }

    #[test]
    fn test_missing_sentinel() {
        let err = assemble("fn main() {}", &["TINT"], &fragments()).unwrap_err();
        assert!(matches!(err, AssemblyError::MissingSentinel { ref sentinel, .. } if sentinel == "//[CALC_TINT]"));
    }

    #[test]
    fn test_only_first_sentinel_replaced() {
        let template = "//[CALC_TINT]\n//[CALC_TINT]";
        let source = assemble(template, &["TINT"], &fragments()).unwrap();
        assert_eq!(source, "color = color + 0.1;\n//[CALC_TINT]");
    }

    #[test]
    fn test_whitespace_does_not_change_output() {
        let squeezed = "//[DEFS_FOG]\nfn main() {\nvar color = 1.0;\n//[CALC_FOG]\n//[CALC_TINT]\n}";
        let a = assemble(TEMPLATE, &["FOG", "TINT"], &fragments()).unwrap();
        let b = assemble(squeezed, &["FOG", "TINT"], &fragments()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_standard_templates_assemble() {
        let library = FragmentLibrary::standard();
        let template = FragmentLibrary::template(ShaderFamily::Geometry, Stage::Fragment);
        let set = library.set(ShaderFamily::Geometry, Stage::Fragment);
        let source = assemble(template, &["MATERIAL", "LIGHTS", "SHADOWS", "LIT_MAT"], &set).unwrap();

        assert!(source.contains("fn pcss("));
        assert!(!source.contains("//[CALC_LIT_MAT]"));
        assert!(source.contains("//[CALC_SSAO]"));
    }
}
