//! Prompts for the shopping agent

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Where the shopping brief lives unless `--brief` says otherwise
pub const DEFAULT_BRIEF: &str = "docs/shopping-brief.md";

/// Architecture name as macOS reports it
fn machine_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "arm64",
        other => other,
    }
}

/// Describe the machine and how to operate it
pub fn build_system_prompt(working_dir: &Path, today: NaiveDate) -> String {
    format!(
        "<SYSTEM_CAPABILITY>
* You are utilising a macOS machine using {arch} architecture with internet access.
* You can interact with the computer using mouse, keyboard, and screenshot tools.
* You have a bash tool for running shell commands.
* You have a text editor tool for reading and writing files.
* Your working directory is {cwd}. Use relative paths for all file operations.
* The current date is {date}.
* To open applications, use Spotlight: key combo \"super+space\", then type the app name and press Return.
* The default browser is Safari. You can type URLs directly into the address bar.
* To get the current Safari URL, run this bash command: osascript -e 'tell application \"Safari\" to get URL of current tab of front window'. This is the fastest and most reliable way to read a URL.
* When viewing a web page, take a screenshot to see the current state. Scroll down if needed content is not visible.
* Every action (click, type, scroll, key, etc.) automatically returns a screenshot of the result. You do not need to call screenshot after each action.
* When using a browser, enter full screen for best visibility.
</SYSTEM_CAPABILITY>
",
        arch = machine_arch(),
        cwd = working_dir.display(),
        date = today.format("%A, %B %-d, %Y"),
    )
}

/// Read the shopper's brief
pub fn load_brief(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read shopping brief {}", path.display()))
}

/// Resolve the brief path against the working directory
pub fn brief_path(working_dir: &Path, brief: Option<&Path>) -> PathBuf {
    let path = brief.unwrap_or_else(|| Path::new(DEFAULT_BRIEF));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

const URL_HINT: &str =
    "Get the URL by running: osascript -e 'tell application \"Safari\" to get URL of current tab of front window'";

const STOP_RULES: &str = "\
- Once you have 3 good options written to the file, stop browsing and finalize the results. Do not continue optimizing.
- Only include options you actually visited and verified on-site. Never recommend products from memory; every option must have a real URL you navigated to.";

/// Mission for one numbered item on the brief's "Buy Next" list
pub fn build_task_prompt(item_number: u32, brief: &str) -> String {
    format!(
        "You are a personal shopper. Your job is to find good options for a specific item from the shopping brief below.

<SHOPPING_BRIEF>
{brief}
</SHOPPING_BRIEF>

<TASK>
Find options for item #{item_number} from the \"Buy Next\" list.

Instructions:
1. Read the item description, budget, and brand preferences carefully.
2. Open Safari and visit 2-3 of the suggested stores (or similar quality retailers).
3. Browse visually. Look at the product photos and evaluate whether each option fits the brief.
4. Find 2-3 good options that match the requirements.
5. {URL_HINT}
6. Write each option to a results file AS YOU FIND IT. Do not wait until the end. Create the file (e.g., results/dark-wash-jeans.md) after your first find, then update it as you find more options. Do a final cleanup pass at the end if needed.

Output format for each option:
- Product name
- Price
- URL
- One sentence on why it fits the brief

Also note any options you considered but rejected, and why. This helps refine future searches.

Important:
- Stay within the stated budget.
- Respect the anti-preferences (no v-necks, no loud patterns, etc.).
- Check sizing using the profile measurements where possible.
- If a store has a sale or promotion, note it.
{STOP_RULES}
</TASK>
"
    )
}

/// Mission for a freeform request, still grounded in the brief
pub fn build_freeform_prompt(task: &str, brief: &str) -> String {
    format!(
        "You are a personal shopper. Here is the shopper's profile and preferences:

<SHOPPING_BRIEF>
{brief}
</SHOPPING_BRIEF>

<TASK>
{task}

Instructions:
1. Open Safari and browse relevant stores.
2. Find 2-3 good options that match the request.
3. {URL_HINT}
4. Write each option to a results file AS YOU FIND IT. Do not wait until the end. Create the file in results/ after your first find, then update it as you find more. Do a final cleanup pass at the end if needed.

Output format for each option:
- Product name
- Price
- URL
- One sentence on why it's a good fit

Also note any options you rejected and why.

Important:
- Respect the anti-preferences listed in the brief.
- Use the profile for sizing decisions.
{STOP_RULES}
</TASK>
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_system_prompt() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        let prompt = build_system_prompt(Path::new("/Users/me/shop"), date);
        assert!(prompt.starts_with("<SYSTEM_CAPABILITY>"));
        assert!(prompt.contains("Your working directory is /Users/me/shop."));
        assert!(prompt.contains("The current date is Tuesday, February 3, 2026."));
        assert!(prompt.contains("\"super+space\""));
        assert!(prompt.trim_end().ends_with("</SYSTEM_CAPABILITY>"));
    }

    #[test]
    fn test_task_prompt_wraps_brief() {
        let prompt = build_task_prompt(3, "## Buy Next\n3. Dark wash jeans");
        assert!(prompt.contains("<SHOPPING_BRIEF>\n## Buy Next\n3. Dark wash jeans\n</SHOPPING_BRIEF>"));
        assert!(prompt.contains("Find options for item #3 from the \"Buy Next\" list."));
        assert!(prompt.contains("5. Get the URL by running: osascript"));
        assert!(prompt.contains("stop browsing and finalize the results"));
    }

    #[test]
    fn test_freeform_prompt() {
        let prompt = build_freeform_prompt("find me a field watch under $100", "brief");
        assert!(prompt.contains("<TASK>\nfind me a field watch under $100\n"));
        assert!(prompt.contains("3. Get the URL by running"));
    }

    #[test]
    fn test_brief_path_and_loading() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            brief_path(dir.path(), None),
            dir.path().join("docs/shopping-brief.md")
        );
        assert_eq!(
            brief_path(dir.path(), Some(Path::new("/tmp/brief.md"))),
            PathBuf::from("/tmp/brief.md")
        );

        let missing = load_brief(&dir.path().join("nope.md")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read shopping brief"));

        std::fs::write(dir.path().join("brief.md"), "profile").unwrap();
        assert_eq!(load_brief(&dir.path().join("brief.md")).unwrap(), "profile");
    }
}
