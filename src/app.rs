//! Terminal host: drives a [`MangaReader`] over one chapter directory.
//!
//! Everything runs on one thread. The loop waits on stdin commands, probe
//! results, chapter actions raised by the reader's hooks, and the reader's
//! next timer deadline, whichever comes first.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use flume::{Receiver, Sender};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use mangaflow::models::LoadType;
use mangaflow::reader::{DragPhase, Effect, FlowGeometry, HostButton, HostHooks, TrackDrag};
use mangaflow::timing::{Clock, SystemClock};
use mangaflow::{Changes, MangaReader, ReaderOptions, TurnDirection};

use crate::host::probe::{ProbePool, ProbeRequest, ProbeResult};
use crate::host::scanner::{scan_chapter, Chapter, ScanConfig};

/// Size of the simulated reading surface until the user resizes it.
const DEFAULT_SURFACE: (f64, f64) = (1280.0, 800.0);
/// Scroll-mode image scale step for `+` and `-`.
const IMG_SCALE_STEP: f64 = 0.1;

const HELP: &str = "\
n/p          next/previous page
f            toggle spread pairing
s            toggle scroll mode
o            toggle one-page mode
d            toggle reading direction
+ - =        scroll-mode image scale up/down/reset
g <0..1>     click the scrollbar at a fraction
z            double-click zoom at the center
r <w> <h>    resize the surface
b <n>        press chapter button n
x            close the end page
q            quit";

/// Requests raised by the reader's hooks, handled after the call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Open(PathBuf),
    Exit { at_end: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Next,
    Prev,
    Fill,
    ScrollMode,
    OnePage,
    Direction,
    ScaleUp,
    ScaleDown,
    ScaleReset,
    Seek(f64),
    Zoom,
    Resize(f64, f64),
    Button(usize),
    CloseEndPage,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(None);
        };
        let cmd = match head {
            "n" => Self::Next,
            "p" => Self::Prev,
            "f" => Self::Fill,
            "s" => Self::ScrollMode,
            "o" => Self::OnePage,
            "d" => Self::Direction,
            "+" => Self::ScaleUp,
            "-" => Self::ScaleDown,
            "=" => Self::ScaleReset,
            "z" => Self::Zoom,
            "x" => Self::CloseEndPage,
            "h" | "?" => Self::Help,
            "q" => Self::Quit,
            "g" => {
                let fraction: f64 = parts
                    .next()
                    .context("Usage: g <fraction>")?
                    .parse()
                    .context("Fraction must be a number")?;
                if !(0.0..=1.0).contains(&fraction) {
                    bail!("Fraction must be between 0 and 1");
                }
                Self::Seek(fraction)
            }
            "r" => {
                let mut dim = || -> Result<f64> {
                    parts
                        .next()
                        .context("Usage: r <width> <height>")?
                        .parse::<f64>()
                        .context("Size must be a number")
                };
                Self::Resize(dim()?, dim()?)
            }
            "b" => Self::Button(
                parts
                    .next()
                    .context("Usage: b <n>")?
                    .parse()
                    .context("Button must be an index")?,
            ),
            other => bail!("Unknown command {other:?}, try h"),
        };
        Ok(Some(cmd))
    }
}

/// Simulated scroll surface for scroll mode.
#[derive(Debug, Clone, Copy)]
struct Surface {
    width: f64,
    height: f64,
    scroll_top: f64,
}

pub struct App {
    reader: MangaReader,
    probe: Rc<ProbePool>,
    generation: Rc<Cell<u64>>,
    chapter: Chapter,
    scan: ScanConfig,
    actions_tx: Sender<HostAction>,
    actions_rx: Receiver<HostAction>,
    surface: Surface,
    last_status: String,
    running: bool,
}

impl App {
    pub fn new(dir: &Path, option: ReaderOptions, workers: usize) -> Result<Self> {
        Self::with_clock(dir, option, workers, Rc::new(SystemClock))
    }

    pub fn with_clock(
        dir: &Path,
        option: ReaderOptions,
        workers: usize,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        let probe = Rc::new(ProbePool::new(workers)?);
        let generation = Rc::new(Cell::new(0u64));
        let mut reader = MangaReader::with_clock(option, clock);

        // Forward every image the loader marks as loading to the probe pool.
        {
            let probe = Rc::clone(&probe);
            let generation = Rc::clone(&generation);
            reader.subscribe(Changes::IMAGE_LOAD, move |state, _| {
                for (index, img) in state.images.iter().enumerate() {
                    if img.load_type != LoadType::Loading {
                        continue;
                    }
                    let Some(src) = img.src.as_deref() else {
                        continue;
                    };
                    probe.request(ProbeRequest {
                        generation: generation.get(),
                        index,
                        path: PathBuf::from(src),
                    });
                }
            });
        }

        let (actions_tx, actions_rx) = flume::unbounded();
        let mut app = Self {
            reader,
            probe,
            generation,
            chapter: Chapter::default(),
            scan: ScanConfig::default(),
            actions_tx,
            actions_rx,
            surface: Surface {
                width: DEFAULT_SURFACE.0,
                height: DEFAULT_SURFACE.1,
                scroll_top: 0.0,
            },
            last_status: String::new(),
            running: true,
        };
        app.open_chapter(dir)?;
        Ok(app)
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Scan `dir` and install it as the current chapter.
    pub fn open_chapter(&mut self, dir: &Path) -> Result<()> {
        let chapter = scan_chapter(dir, &self.scan)?;
        info!(
            title = %chapter.title(),
            images = chapter.images.len(),
            pending = self.probe.pending_count(),
            cached = self.probe.cached_count(),
            "Opening chapter"
        );

        self.generation.set(self.generation.get() + 1);
        self.surface.scroll_top = 0.0;
        let hooks = self.hooks_for(&chapter);
        self.reader.set_host_hooks(hooks);
        self.reader
            .init_reader(chapter.images.iter().map(|p| p.to_string_lossy().into_owned()));
        self.reader.resize(self.surface.width, self.surface.height);
        self.chapter = chapter;
        self.report_geometry();
        Ok(())
    }

    fn hooks_for(&self, chapter: &Chapter) -> HostHooks {
        let mut hooks = HostHooks::new();
        if let Some(prev) = chapter.prev.clone() {
            let tx = self.actions_tx.clone();
            hooks = hooks.with_prev(move || {
                let _ = tx.send(HostAction::Open(prev.clone()));
            });
        }
        if let Some(next) = chapter.next.clone() {
            let tx = self.actions_tx.clone();
            hooks = hooks.with_next(move || {
                let _ = tx.send(HostAction::Open(next.clone()));
            });
        }
        let tx = self.actions_tx.clone();
        hooks = hooks.with_exit(move |at_end| {
            let _ = tx.send(HostAction::Exit { at_end });
        });
        let tx = self.actions_tx.clone();
        let dir = chapter.dir.clone();
        hooks.with_button(HostButton::new("Rescan chapter", move || {
            let _ = tx.send(HostAction::Open(dir.clone()));
        }))
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let results = self.probe.results().clone();
        let actions = self.actions_rx.clone();

        println!("{}", self.chapter().title());
        self.render();

        while self.is_running() {
            let deadline = self.reader.next_deadline();
            let sleep = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                line = lines.next_line() => {
                    match line.context("Failed to read stdin")? {
                        Some(line) => self.handle_line(&line),
                        None => {
                            debug!("stdin closed");
                            self.running = false;
                        }
                    }
                }
                Ok(result) = results.recv_async() => {
                    self.apply_probe_result(result);
                }
                Ok(action) = actions.recv_async() => {
                    self.handle_action(action)?;
                }
                _ = sleep => {
                    self.reader.tick();
                }
            }

            self.drain_actions()?;
            self.apply_effects();
            self.render();
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(Some(cmd)) => self.execute(cmd),
            Ok(None) => {}
            Err(e) => println!("{e:#}"),
        }
    }

    pub fn execute(&mut self, cmd: Command) {
        debug!(?cmd, "Command");
        match cmd {
            Command::Next => self.turn(TurnDirection::Next),
            Command::Prev => self.turn(TurnDirection::Prev),
            Command::Fill => {
                if !self.reader.switch_fill_effect() {
                    println!("The current image does not pair");
                }
            }
            Command::ScrollMode => self.reader.switch_scroll_mode(),
            Command::OnePage => self.reader.switch_one_page_mode(),
            Command::Direction => self.reader.switch_dir(),
            Command::ScaleUp => self.reader.zoom_scroll_mode_img(Some(IMG_SCALE_STEP)),
            Command::ScaleDown => self.reader.zoom_scroll_mode_img(Some(-IMG_SCALE_STEP)),
            Command::ScaleReset => self.reader.zoom_scroll_mode_img(None),
            Command::Seek(fraction) => {
                let track = self.surface.height;
                let y = fraction * track;
                for phase in [DragPhase::Start, DragPhase::End] {
                    self.reader.handle_scrollbar_drag(TrackDrag {
                        phase,
                        y,
                        initial_y: y,
                        track_height: track,
                    });
                }
            }
            Command::Zoom => {
                let (x, y) = (self.surface.width / 2.0, self.surface.height / 2.0);
                if !self.reader.double_click(x, y) {
                    println!("Zoom is not available here");
                }
            }
            Command::Resize(width, height) => {
                self.surface.width = width;
                self.surface.height = height;
                self.reader.resize(width, height);
                self.report_geometry();
            }
            Command::Button(index) => {
                if let Err(e) = self.reader.click_host_button(index) {
                    println!("{e}");
                }
            }
            Command::CloseEndPage => self.reader.dismiss_end_page(),
            Command::Help => println!("{HELP}"),
            Command::Quit => self.running = false,
        }
    }

    fn turn(&mut self, dir: TurnDirection) {
        let state = self.reader.state();
        if state.option.scroll_mode && state.end_page.is_none() {
            let step = match dir {
                TurnDirection::Next => self.surface.height,
                TurnDirection::Prev => -self.surface.height,
            };
            let before = self.surface.scroll_top;
            self.scroll_to(before + step);
            if (self.surface.scroll_top - before).abs() > f64::EPSILON {
                return;
            }
        }
        self.reader.turn_page(dir);
    }

    pub fn apply_probe_result(&mut self, result: ProbeResult) {
        if result.generation() != self.generation.get() {
            debug!(generation = result.generation(), "Dropping stale probe result");
            return;
        }
        let outcome = match result {
            ProbeResult::Loaded {
                index,
                width,
                height,
                ..
            } => self
                .reader
                .set_image_size(index, width, height)
                .and_then(|()| self.reader.mark_image_loaded(index)),
            ProbeResult::Failed { index, error, .. } => {
                debug!(index, %error, "Image failed");
                self.reader.mark_image_error(index)
            }
        };
        if let Err(e) = outcome {
            warn!(error = %e, "Rejected probe result");
        }
        self.report_geometry();
    }

    pub fn handle_action(&mut self, action: HostAction) -> Result<()> {
        match action {
            HostAction::Open(dir) => self.open_chapter(&dir)?,
            HostAction::Exit { at_end } => {
                info!(at_end, "Leaving reader");
                self.running = false;
            }
        }
        Ok(())
    }

    /// Apply actions raised synchronously by hooks during the last command.
    pub fn drain_actions(&mut self) -> Result<()> {
        while let Ok(action) = self.actions_rx.try_recv() {
            self.handle_action(action)?;
        }
        Ok(())
    }

    fn apply_effects(&mut self) {
        for effect in self.reader.take_effects() {
            match effect {
                Effect::ScrollTo { fraction, .. } => {
                    let content = self.flow_geometry().content_height;
                    self.scroll_to(fraction * content);
                }
                Effect::RefreshScroll => {
                    self.surface.scroll_top = 0.0;
                    self.report_geometry();
                }
            }
        }
    }

    fn scroll_to(&mut self, top: f64) {
        let geometry = self.flow_geometry();
        let max = (geometry.content_height - self.surface.height).max(0.0);
        self.surface.scroll_top = top.clamp(0.0, max);
        self.report_geometry();
    }

    fn report_geometry(&mut self) {
        if self.reader.state().option.scroll_mode {
            let geometry = self.flow_geometry();
            self.reader.on_scroll(geometry);
        }
    }

    /// Images stacked at surface width; unknown sizes use the placeholder height.
    fn flow_geometry(&self) -> FlowGeometry {
        let state = self.reader.state();
        let scale = state.option.scroll_mode_img_scale;
        let placeholder = self.reader.placeholder_height();
        let heights: Vec<f64> = state
            .images
            .iter()
            .map(|img| match img.aspect_ratio() {
                Some(ratio) if img.is_loaded() => self.surface.width / ratio * scale,
                _ => placeholder,
            })
            .collect();
        FlowGeometry::stacked(&heights, self.surface.height, self.surface.scroll_top)
    }

    /// One status line, printed only when it changes.
    pub fn status(&self) -> String {
        let state = self.reader.state();
        let mut status = if state.option.scroll_mode {
            let percent = (state.scrollbar.drag_top * 100.0).round();
            format!("[{percent}%]")
        } else {
            format!(
                "[{}/{}]",
                (state.active_page_index + 1).min(state.pages.len()),
                state.pages.len()
            )
        };
        if state.scrollbar.tip_text.is_empty() {
            status.push_str(" -");
        } else {
            status.push(' ');
            status.push_str(&state.scrollbar.tip_text.replace('\n', " / "));
        }
        let zoom = self.reader.zoom_transform();
        if zoom.is_zoomed() {
            status.push_str(&format!(" zoom x{:.1}", zoom.scale));
        }
        let tip = self.reader.end_page_tip();
        if !tip.is_empty() {
            status.push_str("\n  ");
            status.push_str(tip);
        }
        for comment in self.reader.comments() {
            status.push_str("\n  > ");
            status.push_str(comment);
        }
        status
    }

    fn render(&mut self) {
        let status = self.status();
        if status != self.last_status {
            println!("{status}");
            self.last_status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangaflow::timing::ManualClock;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbImage::new(width, height)
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    fn library(chapters: &[(&str, usize)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (name, pages) in chapters {
            let dir = tmp.path().join(name);
            fs::create_dir(&dir).unwrap();
            for i in 0..*pages {
                write_png(&dir.join(format!("{}.png", i + 1)), 60, 80);
            }
        }
        tmp
    }

    /// Advance timers and feed probe results until nothing is loading.
    fn settle(app: &mut App, clock: &ManualClock) {
        for _ in 0..50 {
            clock.advance(Duration::from_millis(150));
            app.reader.tick();
            while let Ok(result) = app.probe.results().recv_timeout(Duration::from_millis(200)) {
                app.apply_probe_result(result);
            }
            let loading = app
                .reader
                .state()
                .images
                .iter()
                .any(|img| img.load_type == LoadType::Loading);
            if !loading {
                break;
            }
        }
        clock.advance(Duration::from_millis(150));
        app.reader.tick();
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("n").unwrap(), Some(Command::Next));
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("g 0.5").unwrap(), Some(Command::Seek(0.5)));
        assert_eq!(
            Command::parse("r 800 600").unwrap(),
            Some(Command::Resize(800.0, 600.0))
        );
        assert_eq!(Command::parse("b 0").unwrap(), Some(Command::Button(0)));
        assert!(Command::parse("g 2").is_err());
        assert!(Command::parse("g").is_err());
        assert!(Command::parse("r 800").is_err());
        assert!(Command::parse("jump").is_err());
    }

    #[test]
    fn test_opens_and_loads_chapter() {
        let tmp = library(&[("ch1", 4)]);
        let clock = ManualClock::new();
        let mut app = App::with_clock(
            &tmp.path().join("ch1"),
            ReaderOptions::default(),
            2,
            Rc::new(clock.clone()),
        )
        .unwrap();
        settle(&mut app, &clock);

        let state = app.reader.state();
        assert_eq!(state.images.len(), 4);
        assert!(state.images.iter().all(|img| img.is_loaded()));
        assert_eq!(state.images[0].width, Some(60));
        assert!(app.status().starts_with("[1/"));
    }

    #[test]
    fn test_turning_past_end_opens_next_chapter() {
        let tmp = library(&[("ch1", 1), ("ch2", 2)]);
        let clock = ManualClock::new();
        let mut app = App::with_clock(
            &tmp.path().join("ch1"),
            ReaderOptions::default(),
            1,
            Rc::new(clock.clone()),
        )
        .unwrap();
        settle(&mut app, &clock);

        app.execute(Command::Next);
        assert!(app.reader.state().end_page.is_some());
        assert!(app.status().contains("next chapter"));

        // The boundary ignores turns until its lock is released.
        clock.advance(Duration::from_millis(250));
        app.reader.tick();
        app.execute(Command::Next);
        app.drain_actions().unwrap();
        assert_eq!(app.chapter().title(), "ch2");
        assert_eq!(app.reader.state().images.len(), 2);
        assert!(app.is_running());
    }

    #[test]
    fn test_exit_from_last_chapter_stops() {
        let tmp = library(&[("only", 1)]);
        let clock = ManualClock::new();
        let mut app = App::with_clock(
            &tmp.path().join("only"),
            ReaderOptions::default(),
            1,
            Rc::new(clock.clone()),
        )
        .unwrap();
        settle(&mut app, &clock);

        app.execute(Command::Next);
        clock.advance(Duration::from_millis(250));
        app.reader.tick();
        app.execute(Command::Next);
        app.drain_actions().unwrap();
        assert!(!app.is_running());
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let tmp = library(&[("ch1", 1)]);
        let clock = ManualClock::new();
        let mut app = App::with_clock(
            &tmp.path().join("ch1"),
            ReaderOptions::default(),
            1,
            Rc::new(clock.clone()),
        )
        .unwrap();
        app.apply_probe_result(ProbeResult::Loaded {
            generation: 0,
            index: 0,
            width: 10,
            height: 10,
        });
        assert_eq!(app.reader.state().images[0].width, None);
    }

    #[test]
    fn test_scroll_mode_steps_through_surface() {
        let tmp = library(&[("ch1", 6)]);
        let clock = ManualClock::new();
        let mut app = App::with_clock(
            &tmp.path().join("ch1"),
            ReaderOptions::default(),
            2,
            Rc::new(clock.clone()),
        )
        .unwrap();
        app.execute(Command::ScrollMode);
        app.apply_effects();
        settle(&mut app, &clock);
        app.report_geometry();

        // 60x80 images at 1280 wide are 1706.67 tall each.
        app.execute(Command::Next);
        assert!((app.surface.scroll_top - 800.0).abs() < 1e-6);
        assert!(app.reader.state().scrollbar.drag_top > 0.0);

        app.execute(Command::Seek(0.0));
        app.apply_effects();
        assert_eq!(app.surface.scroll_top, 0.0);
    }

    #[test]
    fn test_button_rescans_chapter() {
        let tmp = library(&[("ch1", 1)]);
        let clock = ManualClock::new();
        let mut app = App::with_clock(
            &tmp.path().join("ch1"),
            ReaderOptions::default(),
            1,
            Rc::new(clock.clone()),
        )
        .unwrap();
        write_png(&tmp.path().join("ch1").join("2.png"), 60, 80);
        app.execute(Command::Button(0));
        app.drain_actions().unwrap();
        assert_eq!(app.reader.state().images.len(), 2);
        assert_eq!(app.generation.get(), 2);
    }
}
