//! URL segment to controller/action name conversion.

use heck::{ToLowerCamelCase, ToUpperCamelCase};

/// Suffix appended to controller names to form registry keys.
pub const CONTROLLER_SUFFIX: &str = "Controller";

/// `post-list` → `PostList`.
pub fn controller_class(segment: &str) -> String {
    segment.to_upper_camel_case()
}

/// `show-all` → `showAll`. Leading underscores survive so private actions
/// stay recognizable.
pub fn action_method(segment: &str) -> String {
    let rest = segment.trim_start_matches('_');
    let underscores = &segment[..segment.len() - rest.len()];
    format!("{}{}", underscores, rest.to_lower_camel_case())
}

/// Join `dir` and `name` into a normalized `a/b/Name` key, resolving `.` and
/// `..` components and dropping empty ones.
pub fn module_path(dir: &str, name: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in dir.split('/').chain(name.split('/')) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_class() {
        assert_eq!(controller_class("blog"), "Blog");
        assert_eq!(controller_class("post-list"), "PostList");
        assert_eq!(controller_class("user_profile"), "UserProfile");
    }

    #[test]
    fn test_action_method() {
        assert_eq!(action_method("show"), "show");
        assert_eq!(action_method("show-all"), "showAll");
        assert_eq!(action_method("_secret"), "_secret");
        assert_eq!(action_method("__x_y"), "__xY");
    }

    #[test]
    fn test_module_path() {
        assert_eq!(module_path("", "BlogController"), "BlogController");
        assert_eq!(module_path("/blog", "PostController"), "blog/PostController");
        assert_eq!(module_path("admin/v1/", "UserController"), "admin/v1/UserController");
        assert_eq!(module_path("a/../b/./", "X"), "b/X");
    }
}
