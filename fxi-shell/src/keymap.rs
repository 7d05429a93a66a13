//! Shell key bindings, typed as `^<key>` on a line of their own.
//!
//! Keys are single characters, except the arrow names `left` and `right`.

/// What a bound key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellAction {
    /// `^c`: discard the current input.
    ClearInput,
    /// `^d`
    Quit,
    /// `^r`: refresh the current application.
    Refresh,
    /// `^w`: close the current application's monitor.
    CloseMonitor,
    /// `^1`..`^9`: focus the Nth running application (0-based here).
    Focus(usize),
    /// `^left`: previous slide of the current slide show.
    PreviousSlide,
    /// `^right`
    NextSlide,
}

/// Parse a key binding. Anything that is not exactly one binding is `None`.
pub fn parse(input: &str) -> Option<ShellAction> {
    let key = input.trim().strip_prefix('^')?;
    match key.to_ascii_lowercase().as_str() {
        "left" => return Some(ShellAction::PreviousSlide),
        "right" => return Some(ShellAction::NextSlide),
        _ => {}
    }

    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    match c.to_ascii_lowercase() {
        'c' => Some(ShellAction::ClearInput),
        'd' => Some(ShellAction::Quit),
        'r' => Some(ShellAction::Refresh),
        'w' => Some(ShellAction::CloseMonitor),
        '1'..='9' => c.to_digit(10).map(|n| ShellAction::Focus(n as usize - 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings() {
        assert_eq!(parse("^c"), Some(ShellAction::ClearInput));
        assert_eq!(parse("^D"), Some(ShellAction::Quit));
        assert_eq!(parse(" ^r "), Some(ShellAction::Refresh));
        assert_eq!(parse("^w"), Some(ShellAction::CloseMonitor));
        assert_eq!(parse("^1"), Some(ShellAction::Focus(0)));
        assert_eq!(parse("^9"), Some(ShellAction::Focus(8)));
        assert_eq!(parse("^left"), Some(ShellAction::PreviousSlide));
        assert_eq!(parse(" ^Right"), Some(ShellAction::NextSlide));
    }

    #[test]
    fn test_non_bindings() {
        assert_eq!(parse("^0"), None);
        assert_eq!(parse("^"), None);
        assert_eq!(parse("^rr"), None);
        assert_eq!(parse("r"), None);
        assert_eq!(parse("echo ^r"), None);
        assert_eq!(parse("^up"), None);
        assert_eq!(parse("^ left"), None);
    }
}
