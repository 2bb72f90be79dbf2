use super::*;

#[test]
fn test_read_only_subcommands() {
    assert!(!is_git_side_effect("git status"));
    assert!(!is_git_side_effect("git log --oneline -5"));
    assert!(!is_git_side_effect("git diff HEAD~1 -- src"));
    assert!(!is_git_side_effect("git rev-parse --show-toplevel"));
}

#[test]
fn test_mutating_subcommands() {
    assert!(is_git_side_effect("git commit -m x"));
    assert!(is_git_side_effect("git checkout -b feature"));
    assert!(is_git_side_effect("git stash"));
}

#[test]
fn test_unknown_subcommand_is_side_effect() {
    assert!(is_git_side_effect("git frobnicate"));
}

#[test]
fn test_global_options_are_skipped() {
    assert!(is_git_side_effect("git -C /tmp push"));
    assert!(!is_git_side_effect("git -C /tmp status"));
    assert!(!is_git_side_effect("git -c core.pager=cat log"));
    assert!(is_git_side_effect("git --git-dir=/r/.git --work-tree /r add ."));
    assert!(!is_git_side_effect("git --namespace ns show"));
}

#[test]
fn test_display_flags_are_skipped() {
    assert!(!is_git_side_effect("git --no-pager diff"));
    assert!(!is_git_side_effect("git -p log"));
    assert!(is_git_side_effect("git --paginate reset --hard"));
}

#[test]
fn test_composite_commands() {
    assert!(!is_git_side_effect("echo hi && git log"));
    assert!(is_git_side_effect("echo hi && git push"));
    assert!(is_git_side_effect("git status; git add . && git commit -m wip"));
    assert!(!is_git_side_effect("git diff | less"));
}

#[test]
fn test_non_git_commands_are_read_only() {
    assert!(!is_git_side_effect("ls -la"));
    assert!(!is_git_side_effect("echo 'git push'"));
    assert!(!is_git_side_effect("cargo build"));
}

#[test]
fn test_sudo_and_env_prefixes() {
    assert!(is_git_side_effect("sudo git reset --hard"));
    assert!(is_git_side_effect("GIT_AUTHOR_NAME=bot git commit -m x"));
    assert!(!is_git_side_effect("GIT_PAGER=cat git log"));
}

#[test]
fn test_sudo_options_are_skipped() {
    assert!(is_git_side_effect("sudo -u root git push"));
    assert!(is_git_side_effect("sudo -E git commit -m x"));
    assert!(is_git_side_effect("sudo -n -g staff git checkout main"));
    assert!(is_git_side_effect("sudo --user=root -- git reset --hard"));
    assert!(is_git_side_effect("sudo -E GIT_DIR=.git git push"));
    assert!(!is_git_side_effect("sudo -u root git status"));
    assert!(!is_git_side_effect("sudo -u"));
}

#[test]
fn test_git_by_path() {
    assert!(is_git_side_effect("/usr/bin/git push"));
    assert!(!is_git_side_effect("/usr/bin/git status"));
}

#[test]
fn test_git_without_subcommand_is_read_only() {
    assert!(!is_git_side_effect("git"));
    assert!(!is_git_side_effect("git --version"));
}

#[test]
fn test_unparsable_command_falls_back_to_word_match() {
    assert!(is_git_side_effect("echo $(git status)"));
    assert!(is_git_side_effect("git commit -m 'unterminated"));
    assert!(!is_git_side_effect("echo $(date)"));
    assert!(!is_git_side_effect("echo 'legit"));
}

#[test]
fn test_classification_display() {
    assert_eq!(classify("git push").to_string(), "side-effect");
    assert_eq!(classify("git status").to_string(), "read-only");
    assert!(classify("git push").is_side_effect());
}
