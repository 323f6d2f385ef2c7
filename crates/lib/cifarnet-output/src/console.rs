use std::io::{self, Stdout, Write};

use log::warn;

use cifarnet_models::ai::evaluator::Metrics;
use cifarnet_models::ai::network::NetworkKind;
use cifarnet_models::ai::render::{EpochSummary, TrainingProgress, TrainingRenderer};

/// Prints the running mean loss every `report_every` batches, plus one line per finished epoch.
pub struct ConsoleRenderer<W: Write = Stdout> {
    out: W,
    report_every: usize,
    loss_sum: f64,
    pending: usize,
}

impl ConsoleRenderer<Stdout> {
    pub fn stdout(report_every: usize) -> Self {
        Self::new(io::stdout(), report_every)
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, report_every: usize) -> Self {
        Self {
            out,
            report_every: report_every.max(1),
            loss_sum: 0.0,
            pending: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            warn!("Could not write progress line: {}", e);
        }
    }
}

impl<W: Write> TrainingRenderer for ConsoleRenderer<W> {
    fn render_batch(&mut self, progress: &TrainingProgress) {
        self.loss_sum += progress.loss as f64;
        self.pending += 1;
        if progress.batch % self.report_every != 0 {
            return;
        }
        let mean = self.loss_sum / self.pending as f64;
        self.loss_sum = 0.0;
        self.pending = 0;
        self.print(&format!(
            "[{}, {:5}] loss: {:.3}",
            progress.epoch, progress.batch, mean
        ));
    }

    fn render_epoch(&mut self, summary: &EpochSummary) {
        self.loss_sum = 0.0;
        self.pending = 0;
        self.print(&format!(
            "Epoch {}/{}: {} batches, {} samples, mean loss {:.3}",
            summary.epoch, summary.num_epochs, summary.batches, summary.samples, summary.mean_loss
        ));
    }
}

pub fn accuracy_line(network: NetworkKind, metrics: &Metrics) -> String {
    format!(
        "Accuracy of the {} network on the {} test images: {} %",
        network,
        metrics.total,
        metrics.percentage()
    )
}
