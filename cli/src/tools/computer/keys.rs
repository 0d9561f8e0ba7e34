//! X11 key names to `cliclick` commands

/// Modifier keys as `cliclick` names them
fn modifier(key: &str) -> Option<&'static str> {
    Some(match key {
        "super" | "Super_L" | "Super_R" | "cmd" | "command" | "Meta_L" | "Meta_R" => "cmd",
        "ctrl" | "control" | "Control_L" | "Control_R" => "ctrl",
        "alt" | "option" | "Alt_L" | "Alt_R" => "alt",
        "shift" | "Shift_L" | "Shift_R" => "shift",
        "fn" => "fn",
        _ => return None,
    })
}

/// Named keys `cliclick kp:` understands
fn special(key: &str) -> Option<String> {
    let name = match key {
        "Return" | "KP_Enter" | "return" | "enter" => "return",
        "Tab" | "tab" => "tab",
        "space" | "Space" => "space",
        // macOS calls backspace "delete"
        "BackSpace" | "backspace" => "delete",
        "Delete" | "delete" => "fwd-delete",
        "Escape" | "escape" | "Esc" | "esc" => "esc",
        "Up" | "up" => "arrow-up",
        "Down" | "down" => "arrow-down",
        "Left" | "left" => "arrow-left",
        "Right" | "right" => "arrow-right",
        "Home" | "home" => "home",
        "End" | "end" => "end",
        "Page_Up" | "Prior" | "pageup" => "page-up",
        "Page_Down" | "Next" | "pagedown" => "page-down",
        _ => {
            let n = key.strip_prefix('F').and_then(|n| n.parse::<u8>().ok())?;
            return (1..=16).contains(&n).then(|| format!("f{}", n));
        }
    };
    Some(name.to_string())
}

/// How one part of a combo gets pressed
#[derive(Debug, Clone, PartialEq)]
enum Press {
    Modifier(&'static str),
    Named(String),
    Char(char),
}

fn classify(key: &str) -> Option<Press> {
    if let Some(m) = modifier(key) {
        return Some(Press::Modifier(m));
    }
    if let Some(name) = special(key) {
        return Some(Press::Named(name));
    }
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(Press::Char(c)),
        _ => None,
    }
}

/// Translate a combo such as `super+shift+t` into `cliclick` commands
///
/// Modifiers are held down around the final keys and released in reverse.
pub fn combo_commands(combo: &str) -> Result<Vec<String>, String> {
    let parts: Vec<&str> = combo.split('+').map(str::trim).filter(|k| !k.is_empty()).collect();
    if parts.is_empty() {
        return Err("text is required for key".to_string());
    }

    let mut modifiers = Vec::new();
    let mut presses = Vec::new();
    let mut invalid = Vec::new();
    for part in &parts {
        match classify(part) {
            Some(Press::Modifier(m)) => modifiers.push(m),
            Some(press) => presses.push(press),
            None => invalid.push(*part),
        }
    }
    if !invalid.is_empty() {
        return Err(format!("unrecognized key(s): {}", invalid.join(", ")));
    }

    let mut commands = Vec::new();
    if !modifiers.is_empty() {
        commands.push(format!("kd:{}", modifiers.join(",")));
    }
    for press in presses {
        match press {
            Press::Named(name) => commands.push(format!("kp:{}", name)),
            Press::Char(c) => commands.push(format!("t:{}", c)),
            Press::Modifier(_) => {}
        }
    }
    if !modifiers.is_empty() {
        let released: Vec<&str> = modifiers.iter().rev().copied().collect();
        commands.push(format!("ku:{}", released.join(",")));
    }
    Ok(commands)
}

/// Modifiers to hold during a click, e.g. `shift` or `cmd+alt`
pub fn modifier_list(text: &str) -> Result<Vec<&'static str>, String> {
    text.split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| modifier(k).ok_or_else(|| format!("'{}' is not a modifier key", k)))
        .collect()
}

/// Type literal text, pressing return for each newline
pub fn type_commands(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            commands.push("kp:return".to_string());
        }
        if !line.is_empty() {
            commands.push(format!("t:{}", line));
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_named_key() {
        assert_eq!(combo_commands("Return").unwrap(), vec!["kp:return"]);
        assert_eq!(combo_commands("BackSpace").unwrap(), vec!["kp:delete"]);
        assert_eq!(combo_commands("Page_Down").unwrap(), vec!["kp:page-down"]);
        assert_eq!(combo_commands("F5").unwrap(), vec!["kp:f5"]);
    }

    #[test]
    fn test_combo_holds_modifiers() {
        assert_eq!(
            combo_commands("super+space").unwrap(),
            vec!["kd:cmd", "kp:space", "ku:cmd"]
        );
        assert_eq!(
            combo_commands("ctrl+shift+t").unwrap(),
            vec!["kd:ctrl,shift", "t:t", "ku:shift,ctrl"]
        );
        assert_eq!(
            combo_commands("super+l").unwrap(),
            vec!["kd:cmd", "t:l", "ku:cmd"]
        );
    }

    #[test]
    fn test_unrecognized_keys() {
        let err = combo_commands("notarealkey").unwrap_err();
        assert!(err.contains("unrecognized"));
        assert!(combo_commands("F42").is_err());
        assert!(combo_commands("").is_err());
    }

    #[test]
    fn test_modifier_list() {
        assert_eq!(modifier_list("shift").unwrap(), vec!["shift"]);
        assert_eq!(modifier_list("super+alt").unwrap(), vec!["cmd", "alt"]);
        assert!(modifier_list("a").is_err());
    }

    #[test]
    fn test_type_commands_split_lines() {
        assert_eq!(type_commands("hello"), vec!["t:hello"]);
        assert_eq!(
            type_commands("a\nb"),
            vec!["t:a", "kp:return", "t:b"]
        );
        assert_eq!(type_commands("a\n"), vec!["t:a", "kp:return"]);
    }
}
