pub const INVENTOR_SYSTEM: &str = include_str!("../data/prompts/inventor_system.txt");
pub const INVENTOR_USER: &str = include_str!("../data/prompts/inventor_user.txt");
pub const TRANSLATOR_SYSTEM: &str = include_str!("../data/prompts/translator_system.txt");
pub const TRANSLATOR_USER: &str = include_str!("../data/prompts/translator_user.txt");
pub const CURATOR_SYSTEM: &str = include_str!("../data/prompts/curator_system.txt");
pub const CURATOR_USER: &str = include_str!("../data/prompts/curator_user.txt");
pub const IMAGE_STYLE_SUFFIX: &str = include_str!("../data/prompts/image_style_suffix.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_var() {
        assert_eq!(
            render("Problem: {{query}}", &[("query", "my socks vanish")]),
            "Problem: my socks vanish"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{{a}} and {{b}}", &[("a", "cats")]), "cats and {{b}}");
    }

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(!INVENTOR_SYSTEM.is_empty());
        assert!(!TRANSLATOR_SYSTEM.is_empty());
        assert!(!CURATOR_SYSTEM.is_empty());
        assert!(!IMAGE_STYLE_SUFFIX.is_empty());
    }

    #[test]
    fn test_user_templates_have_query_placeholder() {
        for template in [INVENTOR_USER, TRANSLATOR_USER, CURATOR_USER] {
            assert!(template.contains("{{query}}"), "missing placeholder: {template}");
        }
    }

    #[test]
    fn test_curator_system_asks_for_image_prompt_label() {
        assert!(CURATOR_SYSTEM.contains("🌠 Image Prompt:"));
    }
}
