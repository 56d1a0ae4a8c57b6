//! Test doubles for perception and input
//!
//! `ScriptedPerception` answers `locate`/`recognize` from a script that tests
//! can change while handlers are running, and `RecordingInput` records every
//! pointer action so tests can assert on what was clicked.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::config::Settings;
use crate::geometry::{Point, RegionPct, WindowGeometry};
use crate::handlers::Context;
use crate::input::{Actuator, InputDevice, InputError};
use crate::state::GameState;
use crate::vision::{OcrOptions, Perception, Preprocess, Template, TextReading};

type Hook = Arc<dyn Fn() + Send + Sync>;

/// One recorded pointer action
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Move(Point),
    Press,
    Release,
    Click,
}

/// Input device that records every action
#[derive(Clone, Default)]
pub struct RecordingInput {
    events: Arc<Mutex<Vec<InputEvent>>>,
    on_click: Arc<Mutex<Option<Hook>>>,
}

impl RecordingInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` after every click, e.g. to change what perception sees
    pub fn on_click(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_click.lock() = Some(Arc::new(hook));
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    pub fn clicks(&self) -> usize {
        self.count(&InputEvent::Click)
    }

    pub fn presses(&self) -> usize {
        self.count(&InputEvent::Press)
    }

    fn count(&self, kind: &InputEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == kind).count()
    }

    /// Positions that were clicked, in order
    pub fn click_points(&self) -> Vec<Point> {
        let events = self.events.lock();
        let mut last = None;
        let mut points = Vec::new();
        for event in events.iter() {
            match event {
                InputEvent::Move(point) => last = Some(*point),
                InputEvent::Click => points.extend(last),
                _ => {}
            }
        }
        points
    }

    pub fn last_move(&self) -> Option<Point> {
        self.events.lock().iter().rev().find_map(|e| match e {
            InputEvent::Move(point) => Some(*point),
            _ => None,
        })
    }
}

impl InputDevice for RecordingInput {
    fn move_to(&self, point: Point) -> Result<(), InputError> {
        self.events.lock().push(InputEvent::Move(point));
        Ok(())
    }

    fn press_down(&self) -> Result<(), InputError> {
        self.events.lock().push(InputEvent::Press);
        Ok(())
    }

    fn release(&self) -> Result<(), InputError> {
        self.events.lock().push(InputEvent::Release);
        Ok(())
    }

    fn click(&self) -> Result<(), InputError> {
        self.events.lock().push(InputEvent::Click);
        let hook = self.on_click.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}

/// Perception answering from a mutable script
#[derive(Default)]
pub struct ScriptedPerception {
    visible: Mutex<HashMap<Template, Point>>,
    texts: Mutex<Vec<(RegionPct, TextReading)>>,
    queued: Mutex<Vec<(RegionPct, VecDeque<String>)>>,
    ui: Mutex<Vec<Template>>,
    locates: Mutex<HashMap<Template, usize>>,
}

impl ScriptedPerception {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `template` visible at `point`
    pub fn show(&self, template: Template, point: Point) {
        self.visible.lock().insert(template, point);
    }

    pub fn hide(&self, template: &Template) {
        self.visible.lock().remove(template);
    }

    /// Persistent text for `region`
    pub fn set_text(&self, region: RegionPct, text: &str) {
        self.set_reading(region, text, 95.0);
    }

    pub fn set_reading(&self, region: RegionPct, text: &str, confidence: f32) {
        let mut texts = self.texts.lock();
        texts.retain(|(r, _)| *r != region);
        texts.push((
            region,
            TextReading {
                text: text.to_string(),
                confidence,
            },
        ));
    }

    /// Texts returned once each, in order, before the persistent text
    pub fn queue_texts(&self, region: RegionPct, texts: &[&str]) {
        self.queued
            .lock()
            .push((region, texts.iter().map(|t| t.to_string()).collect()));
    }

    pub fn set_ui_templates(&self, templates: Vec<Template>) {
        *self.ui.lock() = templates;
    }

    /// Number of times `template` was looked up
    pub fn locate_count(&self, template: &Template) -> usize {
        self.locates.lock().get(template).copied().unwrap_or(0)
    }
}

impl Perception for ScriptedPerception {
    fn locate(&self, template: &Template) -> Option<Point> {
        *self.locates.lock().entry(template.clone()).or_default() += 1;
        self.visible.lock().get(template).copied()
    }

    fn recognize(
        &self,
        region: RegionPct,
        _options: &OcrOptions,
        _preprocess: &Preprocess,
    ) -> TextReading {
        {
            let mut queued = self.queued.lock();
            let pending = queued
                .iter_mut()
                .find(|(r, t)| *r == region && !t.is_empty());
            if let Some((_, texts)) = pending {
                if let Some(text) = texts.pop_front() {
                    return TextReading {
                        text,
                        confidence: 95.0,
                    };
                }
            }
        }

        self.texts
            .lock()
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, reading)| reading.clone())
            .unwrap_or_default()
    }

    fn ui_templates(&self) -> Vec<Template> {
        self.ui.lock().clone()
    }
}

/// Handler context wired to the test doubles, with fast timings
pub struct Harness {
    pub ctx: Context,
    pub perception: Arc<ScriptedPerception>,
    pub input: RecordingInput,
    pub data_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(Settings::fast())
    }

    pub fn with_settings(mut settings: Settings) -> Self {
        let data_dir = tempfile::tempdir().expect("temp data dir");
        settings.data_dir = data_dir.path().to_path_buf();
        settings.input.lock_file = None;

        let window = WindowGeometry::new(0, 0, 1000, 1000);
        let perception = ScriptedPerception::new();
        let input = RecordingInput::new();
        let actuator = Actuator::new(
            Box::new(input.clone()),
            &window,
            &settings.input,
            &settings.timings,
        )
        .expect("actuator without lock file");

        let ctx = Context::new(
            Arc::new(GameState::new()),
            Arc::clone(&perception) as Arc<dyn Perception>,
            Arc::new(actuator),
            Arc::new(settings),
            window,
        );

        Self {
            ctx,
            perception,
            input,
            data_dir,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.ctx.state
    }
}
