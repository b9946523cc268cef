use crate::{
    AcqError, AcqMessage, Acquisition, Conf, Counter, FrameLayout, MinAmplitude, Persistence,
    RunSummary, Transport,
};
use anyhow::{anyhow, Result};
use crossbeam_channel::{tick, unbounded, Receiver, TryRecvError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::info;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Gauge, Paragraph, Widget},
    DefaultTerminal, Frame,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Channels per row in the minimum-amplitude table.
const CHANNELS_PER_ROW: usize = 8;

/// Consumer-side state of a run: counters, histograms and the status panel.
#[derive(Debug)]
pub struct Status {
    pub counter: Counter,
    pub persistence: Persistence,
    pub minima: MinAmplitude,
    pub requested: usize,
    pub exit: Option<StatusExit>,
    last_timestamp_us: Option<u64>,
    event_rate: f64,
    data_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusExit {
    /// The operator asked to stop.
    Quit,
    /// The acquisition thread finished and hung up.
    Finished,
}

impl Status {
    pub fn new(conf: &Conf, layout: &FrameLayout, requested: usize) -> Self {
        Self {
            counter: Counter::new(),
            persistence: Persistence::new(
                layout.channel_count(),
                layout.samples_per_waveform(),
                conf.monitor.sample_period_ns,
                conf.persistence_axis(),
            ),
            minima: MinAmplitude::new(layout.channel_count(), conf.min_amplitude_axis()),
            requested,
            exit: None,
            last_timestamp_us: None,
            event_rate: 0.0,
            data_rate: 0.0,
        }
    }

    /// Account for one message from the acquisition thread.
    pub fn record(&mut self, msg: AcqMessage) {
        match msg {
            AcqMessage::Event(event) => {
                self.persistence.fill(&event.waveforms);
                self.minima.fill(&event.waveforms);
                self.counter.increment(event.size());
                self.last_timestamp_us = Some(event.timestamp_us);
            }
            AcqMessage::Lost { reason, .. } => self.counter.record_loss(&reason),
        }
    }

    /// Drain the channel without a terminal until the acquisition hangs up.
    pub fn run_headless(&mut self, rx: &Receiver<AcqMessage>) {
        for msg in rx.iter() {
            self.record(msg);
        }
        self.exit = Some(StatusExit::Finished);
    }

    /// Redraw every 100 ms until the acquisition hangs up or `q` is pressed,
    /// which raises `shutdown`.
    pub fn run(
        &mut self,
        terminal: &mut DefaultTerminal,
        rx: &Receiver<AcqMessage>,
        shutdown: &AtomicBool,
    ) -> Result<()> {
        let ticker = tick(Duration::from_millis(100));

        while self.exit.is_none() {
            let _ = ticker.recv();

            loop {
                match rx.try_recv() {
                    Ok(msg) => self.record(msg),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.exit = Some(StatusExit::Finished);
                        break;
                    }
                }
            }

            self.handle_events()?;
            if self.exit == Some(StatusExit::Quit) {
                shutdown.store(true, Ordering::SeqCst);
            }

            self.event_rate = self.counter.event_rate();
            self.data_rate = self.counter.rate();
            terminal.draw(|f| self.draw(f))?;
        }

        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::ZERO)? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    self.handle_key_event(key_event);
                }
            }
        }
        Ok(())
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        if let KeyCode::Char('q') = key_event.code {
            self.exit = Some(StatusExit::Quit);
        }
    }

    fn progress(&self) -> f64 {
        if self.requested == 0 {
            return 1.0;
        }
        let done = self.counter.n_events + self.counter.lost();
        (done as f64 / self.requested as f64).clamp(0.0, 1.0)
    }

    fn minima_lines(&self) -> Vec<Line<'static>> {
        let means = self.minima.means();
        means
            .chunks(CHANNELS_PER_ROW)
            .enumerate()
            .map(|(row, chunk)| {
                let first = row * CHANNELS_PER_ROW;
                let last = first + chunk.len() - 1;
                let mut spans: Vec<Span<'static>> =
                    vec![format!(" ch{:>2}-{:>2}: ", first, last).into()];
                for mean in chunk {
                    spans.push(format!("{:>8.1}", mean).yellow());
                }
                Line::from(spans)
            })
            .collect()
    }
}

impl Widget for &Status {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = Line::from(" DT5560 Acquisition ".bold());
        let instructions = Line::from(vec![" Quit ".into(), "<Q> ".blue().bold()]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(inner);

        let done = self.counter.n_events + self.counter.lost();
        Gauge::default()
            .block(Block::bordered().title(" Progress "))
            .gauge_style(Style::new().green())
            .ratio(self.progress())
            .label(format!("{}/{}", done, self.requested))
            .render(rows[0], buf);

        let status_text = Text::from(vec![
            Line::from(vec![
                "Elapsed time: ".into(),
                self.counter
                    .t_begin
                    .elapsed()
                    .as_secs()
                    .to_string()
                    .yellow(),
                " s".into(),
                " Decoded: ".into(),
                self.counter.n_events.to_string().yellow(),
                " Rate: ".into(),
                format!("{:.1}", self.event_rate).yellow(),
                " ev/s ".into(),
                format!("{:.3}", self.data_rate).yellow(),
                " MB/s".into(),
            ]),
            Line::from(vec![
                "Lost without header: ".into(),
                self.counter.no_header.to_string().red(),
                " Lost incomplete: ".into(),
                self.counter.incomplete.to_string().red(),
                " Last event (us): ".into(),
                self.last_timestamp_us
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string())
                    .yellow(),
            ]),
        ]);
        Paragraph::new(status_text).centered().render(rows[1], buf);

        Paragraph::new(self.minima_lines())
            .block(Block::bordered().title(" Mean minimum amplitude (ADC) "))
            .render(rows[2], buf);
    }
}

/// Run `acq` on its own thread, streaming events over a channel.
///
/// The thread owns the transport; the channel closes when the run ends.
pub fn spawn_acquisition<T>(
    mut acq: Acquisition<T>,
    shutdown: Arc<AtomicBool>,
) -> (
    Receiver<AcqMessage>,
    JoinHandle<std::result::Result<RunSummary, AcqError>>,
)
where
    T: Transport + Send + 'static,
{
    let (mut tx, rx) = unbounded();
    let handle = thread::spawn(move || acq.run(&mut tx, &shutdown));
    (rx, handle)
}

/// Wait for the acquisition thread and log what the consumer saw.
pub fn finish_run(
    handle: JoinHandle<std::result::Result<RunSummary, AcqError>>,
    status: &Status,
) -> Result<RunSummary> {
    let summary = handle
        .join()
        .map_err(|_| anyhow!("acquisition thread panicked"))??;
    info!(
        "Consumer received {} events ({} lost), {:.1} ev/s average, {} persistence entries",
        status.counter.n_events,
        status.counter.lost(),
        status.counter.average_event_rate(),
        status.persistence.entries()
    );
    Ok(summary)
}
