use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use crate::core::state::{App, Mode, Surface};
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{Preview, PromptBox, Splash, StatusBar, Transcript};
use crate::view::display_name;

/// Refresh the prompt box props from the session mode.
pub fn sync_prompt(app: &App, prompt: &mut PromptBox) {
    prompt.dimmed = !app.accepts_prompt();
    let (title, question) = match &app.mode {
        Mode::Input => {
            let title = if app.busy {
                "Prompt (run in progress, Esc twice to interrupt)"
            } else if !app.system_ready {
                "Prompt (waiting for worker)"
            } else {
                "Prompt"
            };
            (title.to_string(), None)
        }
        Mode::ConfirmResume {
            previous_input,
            task,
            total,
        } => {
            let mut question = format!("Resume the saved run at task {task} of {total}? [y/n]");
            if !previous_input.is_empty() {
                question.push_str(&format!("\nPrompt: {previous_input}"));
            }
            (String::from("Checkpoint found"), Some(question))
        }
        Mode::ConfirmImprove { previous_input } => {
            let mut question = String::from("Keep improving the previous run? [y/n]");
            if !previous_input.is_empty() {
                question.push_str(&format!("\nPrompt: {previous_input}"));
            }
            (String::from("Previous run found"), Some(question))
        }
        Mode::Fatal(reason) => (
            String::from("Stopped"),
            Some(format!("{reason}. Press Ctrl+C twice to exit.")),
        ),
    };
    prompt.title = title;
    prompt.question = question;
}

/// Text still streaming in: the plan first, then an agent's reply.
fn preview(app: &App) -> Option<Preview<'_>> {
    if let Some(plan) = &app.plan_preview {
        return Some(Preview {
            title: "Planning…".to_string(),
            body: plan,
        });
    }
    app.stream_preview.as_ref().map(|stream| {
        let verb = if stream.thinking { "thinking" } else { "writing" };
        Preview {
            title: format!("{} is {verb}…", display_name(&stream.agent)),
            body: &stream.text,
        }
    })
}

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState, spinner_frame: usize) {
    if app.surface == Surface::Splash {
        Splash {
            status_message: &app.status_message,
            rag: app.rag.as_ref(),
            spinner_frame,
        }
        .render(frame, frame.area());
        return;
    }

    sync_prompt(app, &mut tui.prompt);
    let prompt_height = tui.prompt.calculate_height(frame.area().width);

    use Constraint::{Length, Min};
    let [status_area, transcript_area, prompt_area] =
        Layout::vertical([Length(1), Min(0), Length(prompt_height)]).areas(frame.area());

    Transcript {
        state: &mut tui.transcript,
        items: app.log.items(),
        preview: preview(app),
    }
    .render(frame, transcript_area);

    StatusBar {
        model_name: app.model_name.clone(),
        status_message: app.status_message.clone(),
        active_agent: app
            .agents
            .active()
            .map(|a| (a.name.clone(), a.status_text.clone())),
        task_progress: app.task_progress.clone(),
        warning: app.gesture.warning(),
        has_unseen_content: tui.transcript.has_unseen_content(),
        busy: app.busy,
        spinner_frame,
    }
    .render(frame, status_area);

    tui.prompt.render(frame, prompt_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::CommittedItem;
    use crate::core::state::StreamPreview;
    use crate::test_support::test_app;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(app: &App, tui: &mut TuiState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| draw_ui(f, app, tui, 0)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_splash_before_startup() {
        let app = test_app();
        let text = screen(&app, &mut TuiState::new());
        assert!(text.contains("Starting worker"));
        assert!(!text.contains("Prompt"));
    }

    #[test]
    fn test_main_surface_layout() {
        let mut app = test_app();
        app.surface = Surface::Main;
        app.system_ready = true;
        app.model_name = Some("gpt-4o".into());
        app.append(|_, batch| {
            batch.push(CommittedItem::log("Relaxation finished"));
        });
        let text = screen(&app, &mut TuiState::new());
        assert!(text.contains("Quasar (gpt-4o)"));
        assert!(text.contains("Relaxation finished"));
        assert!(text.contains("Prompt"));
    }

    #[test]
    fn test_prompt_props_follow_mode() {
        let mut app = test_app();
        let mut prompt = PromptBox::new();

        sync_prompt(&app, &mut prompt);
        assert_eq!(prompt.title, "Prompt (waiting for worker)");
        assert!(prompt.dimmed);

        app.system_ready = true;
        sync_prompt(&app, &mut prompt);
        assert_eq!(prompt.title, "Prompt");
        assert!(!prompt.dimmed);
        assert!(prompt.question.is_none());

        app.mode = Mode::ConfirmResume {
            previous_input: "Relax Si".into(),
            task: 2,
            total: 3,
        };
        sync_prompt(&app, &mut prompt);
        assert_eq!(
            prompt.question.as_deref(),
            Some("Resume the saved run at task 2 of 3? [y/n]\nPrompt: Relax Si")
        );

        app.mode = Mode::Fatal("No checkpoint to resume".into());
        sync_prompt(&app, &mut prompt);
        assert_eq!(prompt.title, "Stopped");
    }

    #[test]
    fn test_streaming_reply_shown_under_transcript() {
        let mut app = test_app();
        app.surface = Surface::Main;
        app.system_ready = true;
        app.stream_preview = Some(StreamPreview {
            agent: "operator".into(),
            text: "Writing the pw.x input".into(),
            thinking: false,
        });
        let text = screen(&app, &mut TuiState::new());
        assert!(text.contains("Operator is writing…"));
        assert!(text.contains("Writing the pw.x input"));

        app.plan_preview = Some("1. Converge cutoff".into());
        let title = preview(&app).map(|p| p.title);
        assert_eq!(title.as_deref(), Some("Planning…"));
    }
}
