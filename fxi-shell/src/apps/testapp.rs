//! Exercises the main list, the monitor and the prompt with generated data.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fxi_api::{Record, Value};
use fxi_kernel::{Application, CommandRegistry};
use rand::Rng;
use rand::seq::SliceRandom;

use super::{AppContext, AppModule};

const ROWS: usize = 200;
const MONITOR_LINES: usize = 250;
const DETAIL_ROWS: usize = 5;

const WORDS: &[&str] = &[
    "queue", "worker", "monitor", "slot", "thread", "image", "render", "tab", "shell", "line",
    "page", "entry", "table", "status", "prompt", "command", "signal", "window", "buffer",
    "cursor", "frame", "panel", "header", "column", "marker", "reader", "loading", "network",
];

pub struct TestApp;

impl AppModule for TestApp {
    fn name(&self) -> &'static str {
        "testapp"
    }

    fn description(&self) -> &'static str {
        "Generated data for trying out the shell"
    }

    fn commands(&self, _ctx: &AppContext) -> CommandRegistry {
        let mut commands = CommandRegistry::new();
        commands
            .register("sleep", Some("Sleep for <n> seconds"), cmd_sleep)
            .register("monitor", Some("Write some garbage into a monitor"), cmd_monitor)
            .register("details", Some("List [n] words and fill in details later"), cmd_details)
            .register("ask", Some("Ask <question> and show the answer"), cmd_ask);
        commands
    }

    fn init(&self, app: &Arc<Application>) -> anyhow::Result<()> {
        app.create_table(
            vec![
                vec!["phrase".to_string()],
                vec!["count".to_string(), "rand".to_string()],
                vec!["word".to_string()],
            ],
            vec!["Phrase".to_string(), String::new(), "Word".to_string()],
        );
        Ok(())
    }

    fn render(&self, app: &Arc<Application>) {
        app.heading("Test App");
        if let Some(table) = app.main_list() {
            table.render(fake_rows(ROWS));
        }
    }
}

fn fake_rows(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let num_words = rng.gen_range(1..=5);
            let phrase: Vec<&str> = WORDS.choose_multiple(&mut rng, num_words).copied().collect();
            let word = WORDS.choose(&mut rng).copied().unwrap_or_default();

            let mut row = Record::new();
            row.insert("phrase".into(), Value::from(phrase.join(" ")));
            row.insert("count".into(), Value::from(num_words));
            row.insert("rand".into(), Value::Int(rng.gen_range(0..=100)));
            row.insert("word".into(), Value::from(word));
            row
        })
        .collect()
}

fn cmd_sleep(app: &Arc<Application>, args: &[String]) -> anyhow::Result<()> {
    let seconds: u64 = args
        .first()
        .context("usage: sleep <n>")?
        .parse()
        .context("sleep: <n> must be a whole number of seconds")?;

    app.info(Some(&format!("Sleeping for {} seconds", seconds)));
    std::thread::sleep(Duration::from_secs(seconds));
    app.info(Some("Woke up!"));
    Ok(())
}

fn cmd_monitor(app: &Arc<Application>, _args: &[String]) -> anyhow::Result<()> {
    let monitor = app.open_monitor(None);
    let mut rng = rand::thread_rng();
    for i in 0..MONITOR_LINES {
        if !app.is_alive() || !monitor.is_alive() {
            return Ok(());
        }
        let indent = rng.gen_range(0..=3);
        monitor.write_line(format!("Line {} (indentation={})", i, indent), indent);
        std::thread::sleep(Duration::from_millis(rng.gen_range(0..=10) * 100));
    }
    monitor.close();
    Ok(())
}

fn cmd_details(app: &Arc<Application>, args: &[String]) -> anyhow::Result<()> {
    let count = args
        .first()
        .map(|n| n.parse::<usize>())
        .transpose()
        .context("details: [n] must be a whole number")?
        .unwrap_or(DETAIL_ROWS);

    let monitor = app.open_monitor(Some("Details"));
    let mut rng = rand::thread_rng();
    for word in WORDS.choose_multiple(&mut rng, count) {
        monitor.write(*word);
        let frame = monitor.add_frame_slot();
        let score: u32 = rng.gen_range(10..=99);
        let votes: u32 = rng.gen_range(1..=5000);
        let related: Vec<&str> = WORDS.choose_multiple(&mut rng, 3).copied().collect();

        app.enqueue(format!("details {}", word), move || {
            // Uneven delays so details arrive out of order.
            std::thread::sleep(Duration::from_millis(u64::from(votes % 7) * 5));
            frame.write_line(format!("{}.{} ({} votes)", score / 10, score % 10, votes), 1);
            frame.write_line(related.join(", "), 1);
            Ok(())
        });
    }
    Ok(())
}

fn cmd_ask(app: &Arc<Application>, args: &[String]) -> anyhow::Result<()> {
    let question = args.join(" ");
    let answer = app.env().prompt.ask(&question, false);
    app.info(answer.as_deref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::launch;
    use super::super::test_env::{MapFetcher, context, env, env_with, eventually};
    use super::*;
    use fxi_api::ShellEvent;
    use fxi_kernel::Prompt;

    struct Echo;

    impl Prompt for Echo {
        fn ask(&self, question: &str, _hidden: bool) -> Option<String> {
            Some(format!("answer to {}", question))
        }
    }

    fn statuses(rx: &mut tokio::sync::broadcast::Receiver<ShellEvent>) -> Vec<Option<String>> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|e| match e {
                ShellEvent::Status { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_renders_generated_table() {
        let t = env();
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        let table = app.main_list().unwrap();
        assert_eq!(table.len(), ROWS);

        for entry in table.entries() {
            let count = match entry.data()["count"] {
                Value::Int(n) => n,
                ref other => panic!("count is {:?}", other),
            };
            assert!((1..=5).contains(&count));
            let phrase = entry.data()["phrase"].to_string();
            assert_eq!(phrase.split(' ').count() as i64, count);
        }
    }

    #[test]
    fn test_sleep_reports_status() {
        let mut t = env();
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        app.handle_command("sleep", vec!["0".into()]).unwrap().join().unwrap();
        assert_eq!(
            statuses(&mut t.events),
            vec![Some("Sleeping for 0 seconds".into()), Some("Woke up!".into())]
        );
    }

    #[test]
    fn test_sleep_without_number_fails_cleanly() {
        let mut t = env();
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        app.handle_command("sleep", vec!["soon".into()]).unwrap().join().unwrap();
        let failed = std::iter::from_fn(|| t.events.try_recv().ok())
            .any(|e| matches!(e, ShellEvent::CommandFailed { command, .. } if command == "sleep"));
        assert!(failed);
        assert!(app.is_alive());
    }

    #[test]
    fn test_ask_shows_answer() {
        let mut t = env_with(MapFetcher::default(), Arc::new(Echo));
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        app.handle_command("ask", vec!["why".into(), "not".into()])
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(statuses(&mut t.events), vec![Some("answer to why not".into())]);
    }

    #[test]
    fn test_details_fill_frames_in_place() {
        let t = env();
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        app.handle_command("details", vec!["4".into()]).unwrap().join().unwrap();
        let monitor = app.current_monitor().unwrap();

        assert!(eventually(|| monitor
            .lines()
            .iter()
            .filter(|line| matches!(line, fxi_api::Line::Frame { .. }))
            .all(|frame| frame.children().len() == 2)));

        let lines = monitor.lines();
        assert_eq!(lines.len(), 1 + 4 * 2);
        assert_eq!(lines[0].text(), Some("Details"));
        for pair in lines[1..].chunks(2) {
            assert!(WORDS.contains(&pair[0].text().unwrap()));
            let details = pair[1].children();
            assert!(details[0].text().unwrap().ends_with(" votes)"));
            assert_eq!(details[1].text().unwrap().split(", ").count(), 3);
        }
    }

    #[test]
    fn test_details_after_close_are_dropped() {
        let t = env();
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        app.handle_command("details", vec![]).unwrap().join().unwrap();
        let monitor = app.current_monitor().unwrap();
        app.close_monitor();

        assert!(eventually(|| app.tasks().stats().completed == DETAIL_ROWS as u64));
        assert_eq!(monitor.line_count(), 0);
    }

    #[test]
    fn test_monitor_stops_when_closed() {
        let t = env();
        let app = launch(&TestApp, t.env.clone(), &context()).unwrap();
        let handle = app.handle_command("monitor", vec![]).unwrap();

        assert!(eventually(|| app
            .current_monitor()
            .is_some_and(|m| m.line_count() > 0)));
        let monitor = app.current_monitor().unwrap();
        app.close_monitor();
        handle.join().unwrap();

        assert!(!monitor.is_alive());
        assert_eq!(monitor.line_count(), 0);
    }
}
