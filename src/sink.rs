use crate::prelude::*;

use async_trait::async_trait;
use std::io::Write;
use tokio::sync::mpsc;

/// Consumer of completed samples. Called once per successful cycle.
#[async_trait]
pub trait Sink: Send {
    async fn deliver(&mut self, sample: &Sample) -> Result<()>;
}

#[async_trait]
impl Sink for mpsc::UnboundedSender<Sample> {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        if self.send(sample.clone()).is_err() {
            bail!("send(sample) failed - channel closed?");
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for mpsc::Sender<Sample> {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        if self.send(sample.clone()).await.is_err() {
            bail!("send(sample) failed - channel closed?");
        }
        Ok(())
    }
}

// {{{ Tee
/// Hands each sample to every sink in turn. One failing sink doesn't keep
/// the sample from the rest; the first error is returned afterwards.
#[derive(Default)]
pub struct Tee {
    sinks: Vec<Box<dyn Sink>>,
}

impl Tee {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Sink for Tee {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        let mut first_err = None;

        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.deliver(sample).await {
                warn!("sink failed: {:#}", e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
// }}}

// {{{ Console
/// Pretty prints each sample, one `name: value` per line, values rendered
/// with the operation's display format.
pub struct Console {
    out: Box<dyn Write + Send>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn render(sample: &Sample) -> String {
        let width = sample.keys().map(str::len).max().unwrap_or(0);

        let mut r = format!("{:width$}: {}\n", Sample::UTC_KEY, sample.utc(), width = width);
        for (name, value) in sample.values() {
            let text = match Operation::lookup(name) {
                Ok(op) => op.format(value),
                Err(_) => value.to_string(),
            };
            r.push_str(&format!("{:width$}: {}\n", name, text, width = width));
        }
        r
    }
}

#[async_trait]
impl Sink for Console {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        writeln!(self.out, "{}", Self::render(sample))?;
        self.out.flush()?;
        Ok(())
    }
}
// }}}

// {{{ JsonWriter
/// Writes one JSON object per sample per line, dates as ISO strings.
pub struct JsonWriter {
    out: Box<dyn Write + Send>,
}

impl JsonWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    /// "stdout" or a file path (appended to).
    pub fn open(target: &str) -> Result<Self> {
        if target == "stdout" {
            return Ok(Self::new(Box::new(std::io::stdout())));
        }

        info!("writing JSON samples to {}", target);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(target)
            .with_context(|| format!("failed to open {}", target))?;

        Ok(Self::new(Box::new(file)))
    }
}

#[async_trait]
impl Sink for JsonWriter {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        let line = serde_json::to_string(sample)?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}
// }}}
