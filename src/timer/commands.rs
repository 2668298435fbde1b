use std::time::Duration;

use log::warn;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use crate::{
    error::TimelineError,
    persistence::SyncOutcome,
    schedule::SegmentStatus,
    timer::{PlanController, TimelineView},
};

const HELP: &str = "commands: start | pause | toggle | select N | + | - | adjust M | status | sync | end | quit";

/// One line typed at the host console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Start,
    Pause,
    Toggle,
    /// Zero-based; the console accepts one-based numbers.
    Select(usize),
    Adjust(f64),
    Status,
    Sync,
    End,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Err("empty command".into());
        };
        let argument = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments for '{}'", word));
        }

        let command = match (word.to_ascii_lowercase().as_str(), argument) {
            ("start", None) => Self::Start,
            ("pause", None) => Self::Pause,
            ("toggle", None) | ("space", None) => Self::Toggle,
            ("+", None) => Self::Adjust(1.0),
            ("-", None) => Self::Adjust(-1.0),
            ("status", None) | ("s", None) => Self::Status,
            ("sync", None) => Self::Sync,
            ("end", None) => Self::End,
            ("help", None) | ("?", None) => Self::Help,
            ("quit", None) | ("exit", None) | ("q", None) => Self::Quit,
            ("select", Some(number)) => {
                let number: usize = number
                    .parse()
                    .map_err(|_| format!("'{}' is not a segment number", number))?;
                if number == 0 {
                    return Err("segments are numbered from 1".into());
                }
                Self::Select(number - 1)
            }
            ("adjust", Some(minutes)) => {
                let minutes: f64 = minutes
                    .parse()
                    .map_err(|_| format!("'{}' is not a number of minutes", minutes))?;
                if !minutes.is_finite() {
                    return Err("adjustment must be finite".into());
                }
                Self::Adjust(minutes)
            }
            ("select", None) | ("adjust", None) => {
                return Err(format!("'{}' needs an argument", word));
            }
            _ => return Err(format!("unknown command '{}'", line.trim())),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub async fn dispatch(
    controller: &PlanController,
    command: ConsoleCommand,
) -> Result<Flow, TimelineError> {
    match command {
        ConsoleCommand::Start => print_view(&controller.start().await?),
        ConsoleCommand::Pause => print_view(&controller.pause().await?),
        ConsoleCommand::Toggle => print_view(&controller.toggle().await?),
        ConsoleCommand::Select(index) => print_view(&controller.select_segment(index).await?),
        ConsoleCommand::Adjust(minutes) => print_view(&controller.adjust_minutes(minutes).await?),
        ConsoleCommand::Status => print_view(&controller.view().await),
        ConsoleCommand::Sync => {
            let outcome = controller.sync_remote_now().await;
            println!("{}", describe_sync(&outcome));
        }
        ConsoleCommand::End => {
            let run = controller.end().await?;
            println!(
                "Ended '{}' after {:.1} min (segment {}/{})",
                run.title,
                run.elapsed_minutes,
                run.planned_segments_reached(),
                run.segment_count
            );
            return Ok(Flow::Exit);
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {
            controller.checkpoint().await;
            return Ok(Flow::Exit);
        }
    }
    Ok(Flow::Continue)
}

/// Reads commands from stdin until `end`, `quit` or EOF, announcing each
/// automatic segment change as it happens.
pub async fn interactive(controller: PlanController) -> anyhow::Result<()> {
    println!("{}", HELP);
    print_view(&controller.view().await);

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut watch = tokio::time::interval(Duration::from_secs(1));
    let mut last_index = controller.view().await.current_segment_index;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.checkpoint().await;
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match ConsoleCommand::parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{}", message);
                        continue;
                    }
                };
                match dispatch(&controller, command).await {
                    Ok(Flow::Exit) => break,
                    Ok(Flow::Continue) => {}
                    Err(err) => {
                        warn!("Command rejected: {}", err);
                        println!("error: {}", err);
                    }
                }
                last_index = controller.view().await.current_segment_index;
            }
            _ = watch.tick() => {
                let view = controller.view().await;
                if view.current_segment_index != last_index {
                    last_index = view.current_segment_index;
                    if let Some(segment) = view.current_segment() {
                        println!("-> now on {}. {}", view.current_segment_index + 1, segment.name);
                    }
                }
            }
        }
    }

    Ok(())
}

pub fn print_view(view: &TimelineView) {
    println!("{}", render_view(view));
}

pub fn render_view(view: &TimelineView) -> String {
    let Some(title) = view.title.as_deref() else {
        return format!("no active plan ({:?})", view.phase);
    };

    let mut out = format!(
        "{} [{}] {} / {:.0} min ({:.0}%)",
        title,
        if view.is_running { "running" } else { "paused" },
        format_minutes(view.elapsed_minutes),
        view.planned_duration_minutes,
        view.progress_percent
    );
    if view.deviation_visible {
        if let Some(deviation) = &view.deviation {
            out.push_str(&format!("\n  {}", deviation));
        }
    }
    for segment in &view.segments {
        let marker = match segment.status {
            SegmentStatus::Completed => "x",
            SegmentStatus::Current => ">",
            SegmentStatus::Upcoming => " ",
        };
        out.push_str(&format!(
            "\n  [{}] {}. {} ({:.0}-{:.0})",
            marker,
            segment.index + 1,
            segment.name,
            segment.start,
            segment.end
        ));
    }
    out
}

fn format_minutes(minutes: f64) -> String {
    let total_seconds = (minutes.max(0.0) * 60.0).round() as u64;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn describe_sync(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Updated => "remote record updated".into(),
        SyncOutcome::RecordMissing => "no remote record for this show yet".into(),
        SyncOutcome::Skipped => "nothing to sync".into(),
        SyncOutcome::Failed(reason) => format!("remote sync failed: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_commands() {
        assert_eq!(ConsoleCommand::parse("start"), Ok(ConsoleCommand::Start));
        assert_eq!(ConsoleCommand::parse("  Pause "), Ok(ConsoleCommand::Pause));
        assert_eq!(ConsoleCommand::parse("select 2"), Ok(ConsoleCommand::Select(1)));
        assert_eq!(ConsoleCommand::parse("+"), Ok(ConsoleCommand::Adjust(1.0)));
        assert_eq!(ConsoleCommand::parse("-"), Ok(ConsoleCommand::Adjust(-1.0)));
        assert_eq!(ConsoleCommand::parse("adjust -2.5"), Ok(ConsoleCommand::Adjust(-2.5)));
        assert_eq!(ConsoleCommand::parse("q"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(ConsoleCommand::parse("").is_err());
        assert!(ConsoleCommand::parse("select").is_err());
        assert!(ConsoleCommand::parse("select 0").is_err());
        assert!(ConsoleCommand::parse("select two").is_err());
        assert!(ConsoleCommand::parse("adjust NaN").is_err());
        assert!(ConsoleCommand::parse("start now").is_err());
        assert!(ConsoleCommand::parse("rewind").is_err());
    }

    #[test]
    fn formats_clock_minutes() {
        assert_eq!(format_minutes(6.5), "06:30");
        assert_eq!(format_minutes(0.0), "00:00");
        assert_eq!(format_minutes(75.25), "75:15");
    }
}
