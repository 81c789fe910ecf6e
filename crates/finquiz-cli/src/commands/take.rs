//! The `finquiz take` command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use finquiz_client::load_config_from;
use finquiz_core::model::Feedback;
use finquiz_core::report::SessionReport;
use finquiz_core::score::ScoreTier;
use finquiz_core::session::{
    AdvanceOutcome, Completion, DeadlinePolicy, EditOutcome, EvaluateOutcome, Phase,
    SessionSnapshot, SubmissionStatus, TestSession,
};
use finquiz_core::timer::{format_clock, is_low_time};

const HELP: &str = "\
Type your answer; each line is appended to it.
  :next   grade the answer, or go to the next question once graded
  :prev   go back one question
  :retry  re-send an answer whose grading failed
  :clear  erase the current answer
  :show   show the current question again
  :quit   leave without submitting";

pub async fn execute(
    test_id: String,
    bank: Option<PathBuf>,
    report: Option<PathBuf>,
    deadline: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let mut session_config = config.session.clone();
    if let Some(policy) = deadline {
        session_config.deadline = policy.parse().map_err(anyhow::Error::msg)?;
    }

    let catalog = super::load(bank.as_deref(), &config).await?;
    let session =
        TestSession::from_catalog(&catalog, &test_id, config.services()?, session_config).await?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    drive(&session, stdin, &mut stdout).await?;

    if let Some(path) = report {
        SessionReport::from_session(&session).save_json(&path)?;
        tracing::debug!(path = %path.display(), "session report written");
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

/// Run the prompt loop until the session completes, the user quits, or input ends.
pub(crate) async fn drive<R, W>(session: &TestSession, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut clock = session.clock();
    let mut watching = session.config().deadline == DeadlinePolicy::Enforce
        && session.test().estimated_minutes > 0;

    let test = session.test();
    writeln!(
        out,
        "{} ({} questions, {}). Type :help for commands.",
        test.title,
        test.questions.len(),
        time_allowance(test.estimated_minutes, session.config().deadline)
    )?;
    if session.phase() == Phase::Active {
        render_question(out, &session.snapshot())?;
    }

    let mut needs_prompt = true;
    while session.phase() == Phase::Active {
        if needs_prompt {
            prompt(out, session)?;
            needs_prompt = false;
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    writeln!(out, "\nInput closed; leaving the session unfinished.")?;
                    return Ok(());
                };

                // The clock keeps running while a grade is in flight. On expiry
                // the pending intent is dropped and its late grade never lands.
                let handled = {
                    let handled = handle_line(session, line.trim_end(), out);
                    tokio::pin!(handled);
                    loop {
                        tokio::select! {
                            result = &mut handled => break Some(result?),
                            changed = clock.changed(), if watching => {
                                if clock_hit_zero(changed, &mut clock, &mut watching)
                                    && session.enforce_deadline().await.is_some()
                                {
                                    break None;
                                }
                            }
                        }
                    }
                };
                match handled {
                    Some(true) => {}
                    Some(false) => return Ok(()),
                    None => writeln!(out, "\nTime is up.")?,
                }
                needs_prompt = true;
            }
            changed = clock.changed(), if watching => {
                if clock_hit_zero(changed, &mut clock, &mut watching)
                    && session.enforce_deadline().await.is_some()
                {
                    writeln!(out, "\nTime is up.")?;
                }
            }
        }
    }

    if let Some(completion) = session.completion() {
        render_completion(out, session, &completion)?;
    }
    Ok(())
}

/// True when the countdown has just reached zero. A closed clock stops being watched.
fn clock_hit_zero(
    changed: Result<(), watch::error::RecvError>,
    clock: &mut watch::Receiver<u64>,
    watching: &mut bool,
) -> bool {
    if changed.is_err() {
        *watching = false;
        return false;
    }
    *clock.borrow_and_update() == 0
}

/// Apply one input line. Returns `false` when the user quits.
async fn handle_line<W: Write>(session: &TestSession, line: &str, out: &mut W) -> Result<bool> {
    match line {
        "" => {}
        ":next" | ":n" => {
            let outcome = session.advance().await;
            report_advance(out, session, outcome)?;
        }
        ":prev" | ":p" => match session.retreat() {
            Some(_) => render_question(out, &session.snapshot())?,
            None => writeln!(out, "Already at the first question.")?,
        },
        ":retry" | ":r" => {
            let outcome = session.retry_evaluation().await;
            report_evaluation(out, session, outcome)?;
        }
        ":clear" => report_edit(out, session.edit_answer(""))?,
        ":show" => render_question(out, &session.snapshot())?,
        ":help" | ":h" => writeln!(out, "{HELP}")?,
        ":quit" | ":q" => {
            writeln!(out, "Leaving the session unfinished; nothing was submitted.")?;
            return Ok(false);
        }
        command if command.starts_with(':') => {
            writeln!(out, "Unknown command {command}. Type :help for commands.")?;
        }
        text => {
            let current = session.snapshot().answer;
            let answer = if current.is_empty() {
                text.to_string()
            } else {
                format!("{current}\n{text}")
            };
            report_edit(out, session.edit_answer(answer))?;
        }
    }
    Ok(true)
}

fn report_edit<W: Write>(out: &mut W, outcome: EditOutcome) -> Result<()> {
    let message = match outcome {
        EditOutcome::Updated => return Ok(()),
        EditOutcome::Frozen => "This question has been graded; its answer can no longer change.",
        EditOutcome::Evaluating => "This answer is being graded.",
        EditOutcome::DeadlinePassed => "Time is up; answers are locked.",
        EditOutcome::Completed => "The session is over.",
    };
    writeln!(out, "{message}")?;
    Ok(())
}

fn report_advance<W: Write>(
    out: &mut W,
    session: &TestSession,
    outcome: AdvanceOutcome,
) -> Result<()> {
    match outcome {
        AdvanceOutcome::Evaluated(outcome) => report_evaluation(out, session, outcome)?,
        AdvanceOutcome::Pending => writeln!(out, "Still grading the current answer.")?,
        AdvanceOutcome::Moved { .. } => render_question(out, &session.snapshot())?,
        AdvanceOutcome::Completed(_) | AdvanceOutcome::AlreadyCompleted => {}
    }
    Ok(())
}

fn report_evaluation<W: Write>(
    out: &mut W,
    session: &TestSession,
    outcome: EvaluateOutcome,
) -> Result<()> {
    match outcome {
        EvaluateOutcome::Stored {
            evaluation: Ok(feedback),
            ..
        } => {
            render_feedback(out, &feedback)?;
            writeln!(out, "Type :next to continue.")?;
        }
        EvaluateOutcome::Stored {
            index,
            evaluation: Err(failure),
        } => {
            render_feedback(out, &failure.sentinel_feedback())?;
            writeln!(
                out,
                "Warning: question {} could not be graded ({}).",
                index + 1,
                failure.reason
            )?;
            if session.config().allow_retry_after_failure {
                writeln!(out, "Type :retry to try again, or :next to move on.")?;
            }
        }
        EvaluateOutcome::Suppressed => writeln!(out, "Still grading the current answer.")?,
        EvaluateOutcome::AlreadyEvaluated => {
            writeln!(out, "Already graded. Type :next to continue.")?
        }
        EvaluateOutcome::NothingToRetry => writeln!(out, "Nothing to retry.")?,
        EvaluateOutcome::Discarded | EvaluateOutcome::NotActive => {
            writeln!(out, "The session is over.")?
        }
    }
    Ok(())
}

fn time_allowance(minutes: u32, deadline: DeadlinePolicy) -> String {
    match (minutes, deadline) {
        (0, _) => "untimed".to_string(),
        (m, DeadlinePolicy::Enforce) => format!("{m} min, enforced"),
        (m, DeadlinePolicy::Soft) => format!("{m} min"),
    }
}

fn prompt<W: Write>(out: &mut W, session: &TestSession) -> Result<()> {
    let remaining = session.remaining_secs();
    let clock = if session.test().estimated_minutes == 0 {
        "--:--".to_string()
    } else if remaining == 0 {
        "time up".to_string()
    } else if is_low_time(remaining) {
        format!("{} !", format_clock(remaining))
    } else {
        format_clock(remaining)
    };
    write!(out, "[{clock}] > ")?;
    out.flush()?;
    Ok(())
}

fn render_question<W: Write>(out: &mut W, snapshot: &SessionSnapshot) -> Result<()> {
    let Some(question) = &snapshot.question else {
        return Ok(());
    };
    writeln!(
        out,
        "\nQuestion {}/{}\n{}",
        snapshot.index + 1,
        snapshot.question_count,
        question.content
    )?;
    if !snapshot.answer.is_empty() {
        writeln!(out, "Your answer:\n{}", snapshot.answer)?;
    }
    if let Some(feedback) = &snapshot.feedback {
        render_feedback(out, feedback)?;
    }
    Ok(())
}

fn render_feedback<W: Write>(out: &mut W, feedback: &Feedback) -> Result<()> {
    let tier = ScoreTier::for_question(feedback.score);
    writeln!(out, "Score: {}/10. {}", feedback.score, tier.feedback_message())?;
    if !feedback.description.is_empty() {
        writeln!(out, "{}", feedback.description)?;
    }
    Ok(())
}

fn render_completion<W: Write>(
    out: &mut W,
    session: &TestSession,
    completion: &Completion,
) -> Result<()> {
    let summary = &completion.summary;
    writeln!(out, "\nTest complete: {}", session.test().title)?;
    if completion.forced {
        writeln!(out, "Time ran out; ungraded questions score 0.")?;
    }
    writeln!(
        out,
        "Score: {}/{} ({})",
        summary.total,
        summary.max,
        summary.percentage_label()
    )?;
    if let Some(tier) = summary.tier() {
        writeln!(out, "{}", tier.achievement_message())?;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Score", "Feedback"]);
    for (i, (question, feedback)) in session
        .test()
        .questions
        .iter()
        .zip(session.feedbacks())
        .enumerate()
    {
        let (score, note) = match feedback {
            Some(f) => (format!("{}/10", f.score), first_line(&f.description)),
            None => ("-".to_string(), "not graded".to_string()),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(first_line(&question.content)),
            Cell::new(score),
            Cell::new(note),
        ]);
    }
    writeln!(out, "{table}")?;

    match &completion.submission {
        SubmissionStatus::Submitted => writeln!(out, "Result saved.")?,
        SubmissionStatus::Pending => writeln!(out, "Result submission pending.")?,
        SubmissionStatus::Failed(e) => writeln!(out, "Warning: your result was not saved: {e}")?,
    }
    Ok(())
}

fn first_line(text: &str) -> String {
    const MAX_CHARS: usize = 60;
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}
