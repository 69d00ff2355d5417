//! Desktop UI: pick an image, look at it, run detection, look at the result.
//!
//! The interaction is a small state machine. Selecting an image shows the
//! original; detection only runs on the explicit button press; a failure
//! drops back to the selected image with the error on screen instead of
//! taking the session down.

use std::path::PathBuf;
use std::sync::Arc;

use iced::widget::image as picture;
use iced::widget::{button, column, container, pick_list, row, scrollable, text};
use iced::{Alignment, Color, Element, Length, Task, Theme};
use tracing::warn;

use crate::config::AppConfig;
use crate::models::Detection;
use crate::workflow::DetectionWorkflow;

/// Run the application until the window closes.
pub fn run(config: AppConfig) -> iced::Result {
    iced::application("Grocery Store Object Detection", App::update, App::view)
        .theme(App::theme)
        .centered()
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
pub enum Message {
    ImagePicked(String),
    DetectPressed,
    ModelLoaded(Result<(), String>),
    DetectionFinished(Result<ResultView, String>),
}

/// Everything the result pane needs, prepared off the UI thread.
///
/// The annotated file is re-read into a bytes handle so an overwritten result
/// is never served from a stale path-keyed cache.
#[derive(Debug, Clone)]
pub struct ResultView {
    pub source: String,
    pub path: PathBuf,
    pub handle: picture::Handle,
    pub detections: Vec<Detection>,
    pub elapsed_ms: u64,
}

/// Interaction states: idle, image selected, detection running, result shown.
#[derive(Debug)]
enum Phase {
    Idle,
    Selected { name: String },
    Detecting { name: String },
    Done { name: String, result: ResultView },
}

struct App {
    workflow: Arc<DetectionWorkflow>,
    image_dir: PathBuf,
    images: Vec<String>,
    phase: Phase,
    model_ready: bool,
    error: Option<String>,
}

impl App {
    fn new(config: AppConfig) -> (Self, Task<Message>) {
        let workflow = Arc::new(DetectionWorkflow::from_config(&config));

        let (images, error) = match workflow.repository().list() {
            Ok(images) => (images, None),
            Err(e) => {
                warn!("repository listing failed: {e}");
                (Vec::new(), Some(format!("No images available: {e}")))
            }
        };

        // warm the model in the background; detection loads on demand anyway
        let preload = {
            let workflow = workflow.clone();
            Task::perform(
                async move {
                    match tokio::task::spawn_blocking(move || workflow.preload()).await {
                        Ok(result) => result.map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    }
                },
                Message::ModelLoaded,
            )
        };

        (
            Self {
                workflow,
                image_dir: config.image_dir,
                images,
                phase: Phase::Idle,
                model_ready: false,
                error,
            },
            preload,
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ImagePicked(name) => {
                // one request at a time; ignore re-selection mid-detection
                if matches!(self.phase, Phase::Detecting { .. }) {
                    return Task::none();
                }
                self.error = None;
                self.phase = Phase::Selected { name };
                Task::none()
            }
            Message::DetectPressed => {
                let name = match &self.phase {
                    Phase::Selected { name } | Phase::Done { name, .. } => name.clone(),
                    _ => return Task::none(),
                };
                self.error = None;
                self.phase = Phase::Detecting { name: name.clone() };

                let workflow = self.workflow.clone();
                Task::perform(
                    async move {
                        match tokio::task::spawn_blocking(move || detect_and_render(&workflow, &name))
                            .await
                        {
                            Ok(result) => result,
                            Err(e) => Err(e.to_string()),
                        }
                    },
                    Message::DetectionFinished,
                )
            }
            Message::ModelLoaded(Ok(())) => {
                self.model_ready = true;
                Task::none()
            }
            Message::ModelLoaded(Err(e)) => {
                // not fatal: the next detect retries the load
                warn!("model preload failed: {e}");
                self.error = Some(format!("Model not loaded yet: {e}"));
                Task::none()
            }
            Message::DetectionFinished(Ok(result)) => {
                if matches!(self.phase, Phase::Detecting { .. }) {
                    self.model_ready = true;
                    self.phase = Phase::Done {
                        name: result.source.clone(),
                        result,
                    };
                }
                Task::none()
            }
            Message::DetectionFinished(Err(e)) => {
                if let Phase::Detecting { name } = &self.phase {
                    self.phase = Phase::Selected { name: name.clone() };
                    self.error = Some(e);
                }
                Task::none()
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let selected = self.selected_name().map(str::to_string);

        let picker = pick_list(self.images.clone(), selected.clone(), Message::ImagePicked)
            .placeholder("Select an image...")
            .width(Length::Fixed(320.0));

        let detect = button("Detect objects").on_press_maybe(
            matches!(
                self.phase,
                Phase::Selected { .. } | Phase::Done { .. }
            )
            .then_some(Message::DetectPressed),
        );

        let mut content = column![
            text("Grocery Store Object Detection").size(28),
            text("Detect objects in predefined grocery images."),
            row![picker, detect].spacing(12).align_y(Alignment::Center),
        ]
        .spacing(12)
        .padding(20)
        .align_x(Alignment::Center);

        content = content.push(self.status_line());

        if let Some(error) = &self.error {
            content = content.push(text(error.clone()).color(Color::from_rgb(0.9, 0.3, 0.3)));
        }

        if self.images.is_empty() && self.error.is_none() {
            content = content.push(text("No images available."));
        }

        let mut panes = row![].spacing(16).align_y(Alignment::Start);
        if let Some(name) = &selected {
            panes = panes.push(
                column![
                    text("Selected image"),
                    picture(picture::Handle::from_path(self.image_dir.join(name)))
                        .width(Length::Fixed(420.0)),
                ]
                .spacing(6)
                .align_x(Alignment::Center),
            );
        }
        if let Phase::Done { result, .. } = &self.phase {
            panes = panes.push(
                column![
                    text("Detected objects"),
                    picture(result.handle.clone()).width(Length::Fixed(420.0)),
                    self.detection_list(result),
                ]
                .spacing(6)
                .align_x(Alignment::Center),
            );
        }
        content = content.push(panes);

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn selected_name(&self) -> Option<&str> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Selected { name } | Phase::Detecting { name } | Phase::Done { name, .. } => {
                Some(name)
            }
        }
    }

    fn status_line(&self) -> Element<'_, Message> {
        let status = match &self.phase {
            Phase::Detecting { .. } => "Processing the image...".to_string(),
            Phase::Done { result, .. } => format!(
                "{} objects found in {} ms — saved to {}",
                result.detections.len(),
                result.elapsed_ms,
                result.path.display()
            ),
            _ if !self.model_ready => "Loading model...".to_string(),
            _ => "Ready.".to_string(),
        };
        text(status).size(14).into()
    }

    fn detection_list(&self, result: &ResultView) -> Element<'_, Message> {
        let mut lines = column![].spacing(2);
        for det in &result.detections {
            lines = lines.push(
                text(format!(
                    "{} {:.0}% at ({:.0}, {:.0})",
                    det.label,
                    det.confidence * 100.0,
                    det.bbox.x1,
                    det.bbox.y1
                ))
                .size(13),
            );
        }
        lines.into()
    }
}

/// Blocking worker for one detect request: run the workflow, then re-read the
/// written file into a display handle.
fn detect_and_render(workflow: &DetectionWorkflow, name: &str) -> Result<ResultView, String> {
    let outcome = workflow.run(name).map_err(|e| e.to_string())?;
    let bytes = std::fs::read(&outcome.result_path)
        .map_err(|e| format!("cannot read back {}: {e}", outcome.result_path.display()))?;
    Ok(ResultView {
        source: outcome.source,
        path: outcome.result_path,
        handle: picture::Handle::from_bytes(bytes),
        detections: outcome.detections,
        elapsed_ms: outcome.elapsed.as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let config = AppConfig::default();
        App {
            workflow: Arc::new(DetectionWorkflow::from_config(&config)),
            image_dir: config.image_dir,
            images: vec!["apple.jpg".to_string(), "banana.png".to_string()],
            phase: Phase::Idle,
            model_ready: false,
            error: None,
        }
    }

    fn dummy_result(source: &str) -> ResultView {
        ResultView {
            source: source.to_string(),
            path: PathBuf::from("results/result_apple.jpg"),
            handle: picture::Handle::from_bytes(Vec::new()),
            detections: Vec::new(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn selecting_an_image_enters_selected() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        assert!(matches!(&app.phase, Phase::Selected { name } if name == "apple.jpg"));
    }

    #[test]
    fn detect_without_selection_stays_idle() {
        let mut app = test_app();
        let _ = app.update(Message::DetectPressed);
        assert!(matches!(app.phase, Phase::Idle));
    }

    #[test]
    fn detect_moves_to_detecting() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        assert!(matches!(&app.phase, Phase::Detecting { name } if name == "apple.jpg"));
    }

    #[test]
    fn selection_is_ignored_while_detecting() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        let _ = app.update(Message::ImagePicked("banana.png".to_string()));
        assert!(matches!(&app.phase, Phase::Detecting { name } if name == "apple.jpg"));
    }

    #[test]
    fn successful_detection_shows_the_result() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        let _ = app.update(Message::DetectionFinished(Ok(dummy_result("apple.jpg"))));
        assert!(matches!(&app.phase, Phase::Done { name, .. } if name == "apple.jpg"));
        assert!(app.error.is_none());
    }

    #[test]
    fn failed_detection_returns_to_selected_with_error() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        let _ = app.update(Message::DetectionFinished(Err("inference failed".to_string())));
        assert!(matches!(&app.phase, Phase::Selected { name } if name == "apple.jpg"));
        assert_eq!(app.error.as_deref(), Some("inference failed"));
    }

    #[test]
    fn new_selection_discards_the_result_view() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        let _ = app.update(Message::DetectionFinished(Ok(dummy_result("apple.jpg"))));
        let _ = app.update(Message::ImagePicked("banana.png".to_string()));
        assert!(matches!(&app.phase, Phase::Selected { name } if name == "banana.png"));
    }

    #[test]
    fn redetect_is_allowed_from_the_result_view() {
        let mut app = test_app();
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        let _ = app.update(Message::DetectionFinished(Ok(dummy_result("apple.jpg"))));
        let _ = app.update(Message::DetectPressed);
        assert!(matches!(&app.phase, Phase::Detecting { name } if name == "apple.jpg"));
    }

    #[test]
    fn preload_failure_is_reported_but_not_fatal() {
        let mut app = test_app();
        let _ = app.update(Message::ModelLoaded(Err("weights missing".to_string())));
        assert!(!app.model_ready);
        assert!(app.error.is_some());
        // the user can still select and trigger detection
        let _ = app.update(Message::ImagePicked("apple.jpg".to_string()));
        let _ = app.update(Message::DetectPressed);
        assert!(matches!(app.phase, Phase::Detecting { .. }));
    }

    #[test]
    fn stray_detection_result_outside_detecting_is_ignored() {
        let mut app = test_app();
        let _ = app.update(Message::DetectionFinished(Ok(dummy_result("apple.jpg"))));
        assert!(matches!(app.phase, Phase::Idle));
    }
}
