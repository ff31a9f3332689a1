#![allow(dead_code)]

use aurora_bridge::aurora::packet::{self, Frame, FRAME_LEN};
use aurora_bridge::prelude::*;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();
impl Factory {
    pub fn address() -> u8 {
        2
    }

    /// Reply body carrying `value` after the two state bytes.
    pub fn body(value: [u8; 4]) -> [u8; 6] {
        let mut r = [0, 6, 0, 0, 0, 0];
        r[2..].copy_from_slice(&value);
        r
    }

    pub fn reply(body: &[u8]) -> Vec<u8> {
        let mut r = body.to_vec();
        packet::add_crc(&mut r);
        r
    }

    pub fn client(stream: DuplexStream) -> Client<DuplexStream> {
        Client::new(
            stream,
            Self::address(),
            Duration::ZERO,
            Duration::from_millis(200),
        )
    }

    pub fn utc(secs: i64, millis: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, millis * 1_000_000).unwrap()
    }
}

// {{{ FakeInverter
/// Answers frames on the far end of an in-memory pipe, keyed by
/// (opcode, sub-opcode). Unknown requests get an all-zero body.
#[derive(Default)]
pub struct FakeInverter {
    replies: HashMap<(u8, u8), [u8; 6]>,
    corrupt_nth: Option<usize>,
    hang_up_after: Option<usize>,
    silent: bool,
}

impl FakeInverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, name: &str, body: [u8; 6]) -> Self {
        let op = Operation::lookup(name).unwrap();
        self.replies
            .insert((op.opcode(), op.sub_opcode().unwrap_or(0)), body);
        self
    }

    pub fn float(self, name: &str, value: f32) -> Self {
        self.reply(name, Factory::body(value.to_be_bytes()))
    }

    pub fn int(self, name: &str, value: i32) -> Self {
        self.reply(name, Factory::body(value.to_be_bytes()))
    }

    /// Flip the CRC of the reply to the `n`th request (1-based).
    pub fn corrupt_nth(mut self, n: usize) -> Self {
        self.corrupt_nth = Some(n);
        self
    }

    /// Close the connection after reading the `n`th request.
    pub fn hang_up_after(mut self, n: usize) -> Self {
        self.hang_up_after = Some(n);
        self
    }

    /// Read requests but never answer.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Returns the client end and a handle yielding every frame received,
    /// once the client is dropped.
    pub fn spawn(self) -> (Client<DuplexStream>, JoinHandle<Vec<Frame>>) {
        let (client, mut server) = tokio::io::duplex(256);

        let handle = tokio::spawn(async move {
            let mut frames = Vec::new();

            loop {
                let mut frame = [0; FRAME_LEN];
                if server.read_exact(&mut frame).await.is_err() {
                    break;
                }
                frames.push(frame);
                let n = frames.len();

                if self.hang_up_after == Some(n) {
                    break;
                }
                if self.silent {
                    continue;
                }

                let body = self
                    .replies
                    .get(&(frame[1], frame[2]))
                    .copied()
                    .unwrap_or_default();
                let mut reply = Factory::reply(&body);
                if self.corrupt_nth == Some(n) {
                    reply[6] ^= 0xff;
                }

                if server.write_all(&reply).await.is_err() {
                    break;
                }
            }

            frames
        });

        (Factory::client(client), handle)
    }
}
// }}}

// {{{ ManualClock
/// Clock that only moves when slept on or advanced. Every sleep is off by
/// `skew`: late like a loaded host, or early like a slewed wall clock.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    skew: chrono::Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_jitter(start, Duration::ZERO)
    }

    pub fn with_jitter(start: DateTime<Utc>, jitter: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            skew: chrono::Duration::from_std(jitter).unwrap(),
        }
    }

    pub fn waking_early(start: DateTime<Utc>, by: Duration) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            skew: -chrono::Duration::from_std(by).unwrap(),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap() + self.skew;
        }
        tokio::task::yield_now().await;
    }
}
// }}}
