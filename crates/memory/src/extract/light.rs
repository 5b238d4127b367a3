//! Rule-based line classifier.
//!
//! Every line of every turn is tested against five independent pattern
//! families, so one line can land in several lists.  Length windows keep out
//! fragments too short to mean anything and pasted blobs too long to be a
//! single fact.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractedKnowledge, Role, Turn};

/// Cap on entries kept per kind.
pub const MAX_PER_KIND: usize = 5;

const DECISION_LEN: Range<usize> = 15..300;
const SOLUTION_LEN: Range<usize> = 15..300;
const LEARNING_LEN: Range<usize> = 10..300;
const TODO_LEN: Range<usize> = 10..200;
const COMMAND_MAX_LEN: usize = 200;

static DECISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(decided|going with|let'?s (go|use|do)|we('ll| will) (use|go))\b")
        .expect("valid decision regex")
});

static SOLUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fix(ed)?|solved?|resolved?|the (issue|problem|error) was|workaround)\b")
        .expect("valid solution regex")
});

static LEARNING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bturns out\b|\blearned\b|\bdiscovered\b|\bimportant(ly)?\b|\bnote:|\bkey (insight|takeaway))")
        .expect("valid learning regex")
});

static TODO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bTODO\b|\bFIXME\b|(?i:\bneed to\b|\bshould\b|\bremember to\b|\bdon'?t forget\b)")
        .expect("valid todo regex")
});

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\$\s+)?(npm|npx|pnpm|yarn|bun|pip3?|uv|poetry|cargo|rustup|go\s+(build|run|test|get|install|mod|vet|fmt)|brew|apt(-get)?|dnf|yum|aws|gcloud|gsutil|az|kubectl|helm|docker|docker-compose|podman|vagrant|multipass|terraform|git|gh)\s",
    )
    .expect("valid command regex")
});

/// Keeps the first [`MAX_PER_KIND`] distinct entries.
#[derive(Default)]
struct Bucket(Vec<String>);

impl Bucket {
    fn offer(&mut self, line: &str) {
        if self.0.len() < MAX_PER_KIND && !self.0.iter().any(|seen| seen == line) {
            self.0.push(line.to_string());
        }
    }
}

fn within(len: usize, window: &Range<usize>) -> bool {
    window.contains(&len)
}

/// Classify every line of `turns`.  `project_hint` is passed through as the
/// record's project context.
pub fn extract(turns: &[Turn], project_hint: Option<&str>) -> ExtractedKnowledge {
    let mut decisions = Bucket::default();
    let mut solutions = Bucket::default();
    let mut learnings = Bucket::default();
    let mut todos = Bucket::default();
    let mut commands = Bucket::default();

    for turn in turns {
        let from_assistant = turn.role == Role::Assistant;
        for raw in turn.content.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let len = line.chars().count();

            if within(len, &DECISION_LEN) && DECISION_RE.is_match(line) {
                decisions.offer(line);
            }
            if within(len, &SOLUTION_LEN) && SOLUTION_RE.is_match(line) {
                solutions.offer(line);
            }
            if within(len, &LEARNING_LEN) && LEARNING_RE.is_match(line) {
                learnings.offer(line);
            }
            if within(len, &TODO_LEN) && TODO_RE.is_match(line) {
                todos.offer(line);
            }
            if from_assistant
                && len < COMMAND_MAX_LEN
                && !line.starts_with("```")
                && COMMAND_RE.is_match(line)
            {
                commands.offer(line);
            }
        }
    }

    ExtractedKnowledge {
        decisions: decisions.0,
        solutions: solutions.0,
        learnings: learnings.0,
        todos: todos.0,
        commands: commands.0,
        project_context: project_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .map(ToString::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_family() {
        let turns = vec![
            Turn::user("We decided to keep the monolith for now."),
            Turn::assistant(
                "The issue was a stale lockfile in CI.\n\
                 Turns out the cache key ignored Cargo.lock.\n\
                 TODO: pin the toolchain version\n\
                 cargo update -p serde",
            ),
        ];

        let knowledge = extract(&turns, Some("infra"));
        assert_eq!(knowledge.decisions, vec!["We decided to keep the monolith for now."]);
        assert_eq!(knowledge.solutions, vec!["The issue was a stale lockfile in CI."]);
        assert_eq!(knowledge.learnings, vec!["Turns out the cache key ignored Cargo.lock."]);
        assert_eq!(knowledge.todos, vec!["TODO: pin the toolchain version"]);
        assert_eq!(knowledge.commands, vec!["cargo update -p serde"]);
        assert_eq!(knowledge.project_context.as_deref(), Some("infra"));
    }

    #[test]
    fn one_line_can_match_several_families() {
        let turns = vec![Turn::user("Let's use the workaround we discovered yesterday.")];
        let knowledge = extract(&turns, None);
        assert_eq!(knowledge.decisions.len(), 1);
        assert_eq!(knowledge.solutions.len(), 1);
        assert_eq!(knowledge.learnings.len(), 1);
        assert!(knowledge.project_context.is_none());
    }

    #[test]
    fn length_windows_are_enforced() {
        let short = "decided it"; // 10 chars, below the decision floor
        let long = format!("we decided {}", "x".repeat(300));
        let knowledge = extract(&[Turn::user(format!("{short}\n{long}"))], None);
        assert!(knowledge.decisions.is_empty());

        // 10 chars is the learning floor.
        let knowledge = extract(&[Turn::user("learned it")], None);
        assert_eq!(knowledge.learnings, vec!["learned it"]);
    }

    #[test]
    fn solution_floor_is_fifteen() {
        let knowledge = extract(&[Turn::user("fixed the bug.\nfixed the bugs.")], None);
        assert_eq!(knowledge.solutions, vec!["fixed the bugs."]);
    }

    #[test]
    fn learning_ceiling_is_three_hundred() {
        let at_limit = format!("learned {}", "x".repeat(292));
        let below = format!("learned {}", "y".repeat(291));
        assert_eq!(at_limit.len(), 300);
        let knowledge = extract(&[Turn::user(format!("{at_limit}\n{below}"))], None);
        assert_eq!(knowledge.learnings, vec![below]);
    }

    #[test]
    fn todo_ceiling_is_two_hundred() {
        let at_limit = format!("TODO: {}", "x".repeat(194));
        let below = format!("TODO: {}", "y".repeat(193));
        assert_eq!(at_limit.len(), 200);
        let knowledge = extract(&[Turn::user(format!("{at_limit}\n{below}"))], None);
        assert_eq!(knowledge.todos, vec![below]);
    }

    #[test]
    fn commands_must_be_shorter_than_two_hundred() {
        let at_limit = format!("git commit -m {}", "x".repeat(186));
        let below = format!("git commit -m {}", "y".repeat(185));
        assert_eq!(at_limit.len(), 200);
        let knowledge = extract(&[Turn::assistant(format!("{at_limit}\n{below}"))], None);
        assert_eq!(knowledge.commands, vec![below]);
    }

    #[test]
    fn go_needs_a_subcommand_to_count_as_a_command() {
        let knowledge = extract(
            &[Turn::assistant("go ahead and restart the pod\ngo test ./...\ngo build -o bin/server")],
            None,
        );
        assert_eq!(knowledge.commands, vec!["go test ./...", "go build -o bin/server"]);
    }

    #[test]
    fn todo_markers_are_case_sensitive_but_phrases_are_not() {
        let knowledge = extract(&[Turn::user("todo list cleanup day\nWe NEED TO rotate keys")], None);
        assert_eq!(knowledge.todos, vec!["We NEED TO rotate keys"]);
    }

    #[test]
    fn commands_only_come_from_assistant_turns() {
        let turns = vec![
            Turn::user("git status"),
            Turn::assistant("```bash\ndocker compose up -d\n$ kubectl get pods\n```"),
        ];
        let knowledge = extract(&turns, None);
        assert_eq!(knowledge.commands, vec!["docker compose up -d", "$ kubectl get pods"]);
    }

    #[test]
    fn deduplicates_and_caps_at_five() {
        let mut lines = vec!["We decided to ship on Friday."; 3];
        let others: Vec<String> = (0..8).map(|i| format!("We decided on option number {i}")).collect();
        lines.extend(others.iter().map(String::as_str));
        let knowledge = extract(&[Turn::user(lines.join("\n"))], None);

        assert_eq!(knowledge.decisions.len(), MAX_PER_KIND);
        assert_eq!(knowledge.decisions[0], "We decided to ship on Friday.");
        assert_eq!(knowledge.decisions[1], "We decided on option number 0");
        assert_eq!(knowledge.decisions[4], "We decided on option number 3");
    }

    #[test]
    fn near_duplicates_are_kept_apart() {
        let knowledge = extract(
            &[Turn::user("We decided to use Postgres.\nWe decided to use Postgres!")],
            None,
        );
        assert_eq!(knowledge.decisions.len(), 2);
    }

    #[test]
    fn empty_input_is_empty_record() {
        assert!(extract(&[], Some("  ")).is_empty());
        assert!(extract(&[], Some("  ")).project_context.is_none());
    }
}
