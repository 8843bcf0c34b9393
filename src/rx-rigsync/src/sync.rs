// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Keeps the receiver's displayed frequency locked to a rig's dial while the
//! receiver hardware stays parked on the rig's IF.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use crate::client::{LineClient, SyncResult};
use crate::endpoint::Endpoint;
use crate::lnb::calc_lnb_lo;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// rigctl server of the rig whose IF is tapped.
    pub rig: Endpoint,
    /// Receiver remote-control endpoint.
    pub remote: Endpoint,
    pub if_freq_hz: u64,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigReading {
    pub freq_hz: u64,
    pub mode: String,
}

pub struct RigSync {
    rig: LineClient,
    remote: LineClient,
    if_freq_hz: u64,
    last: Option<RigReading>,
}

impl RigSync {
    pub async fn connect(settings: &SyncSettings) -> SyncResult<Self> {
        let rig = LineClient::connect("rig", &settings.rig).await?;
        let remote = LineClient::connect("remote", &settings.remote).await?;
        Ok(Self {
            rig,
            remote,
            if_freq_hz: settings.if_freq_hz,
            last: None,
        })
    }

    /// Park the receiver hardware on the IF with no LO or filter offset.
    pub async fn park_on_if(&mut self) -> SyncResult<()> {
        // Zero these first so the hardware retune is not reinterpreted.
        self.remote.set("LNB_LO 0").await?;
        self.remote.set("gqrx_set_filter_offset 0").await?;
        self.remote
            .set(&format!("gqrx_set_hw_freq {}", self.if_freq_hz))
            .await?;
        info!("Receiver hardware parked on IF {} Hz", self.if_freq_hz);
        Ok(())
    }

    /// rigctl `m` answers mode then passband; `f` answers the dial in Hz.
    pub async fn read_rig(&mut self) -> SyncResult<RigReading> {
        let mode = self.rig.query("m").await?;
        let _passband = self.rig.read_line().await?;
        let freq_hz = self.rig.query_number("f").await?;
        Ok(RigReading {
            freq_hz,
            mode: mode.trim().to_string(),
        })
    }

    /// One sync step. Returns the LNB LO that was sent, if any.
    pub async fn poll_once(&mut self) -> SyncResult<Option<i64>> {
        let reading = self.read_rig().await?;
        let hw_freq: u64 = self.remote.query_number("gqrx_get_hw_freq").await?;
        if hw_freq == 0 {
            debug!("Receiver reports no hardware frequency yet");
            return Ok(None);
        }
        let filter_offset: i64 = self.remote.query_number("gqrx_get_filter_offset").await?;
        debug!(
            "Rig {} Hz {}, receiver hw {} Hz, filter offset {} Hz",
            reading.freq_hz, reading.mode, hw_freq, filter_offset
        );

        if self.last.as_ref() == Some(&reading) {
            return Ok(None);
        }

        let lnb_lo = calc_lnb_lo(reading.freq_hz, self.if_freq_hz, &reading.mode);
        if hw_freq != self.if_freq_hz {
            info!(
                "Receiver hardware drifted to {} Hz; resetting to IF",
                hw_freq
            );
            self.park_on_if().await?;
        }
        self.remote.set(&format!("LNB_LO {}", lnb_lo)).await?;
        info!(
            "Rig at {} Hz {}: LNB LO set to {} Hz",
            reading.freq_hz, reading.mode, lnb_lo
        );
        self.last = Some(reading);
        Ok(Some(lnb_lo))
    }
}

/// Sync until shutdown, reconnecting with backoff when either side drops.
pub async fn run_sync(settings: SyncSettings, mut shutdown_rx: watch::Receiver<bool>) {
    let mut reconnect_delay = Duration::from_secs(1);

    loop {
        if *shutdown_rx.borrow() {
            info!("Rig sync shutting down");
            return;
        }

        info!(
            "Connecting to rig {} and receiver {}",
            settings.rig, settings.remote
        );
        match connect_and_park(&settings).await {
            Ok(mut sync) => {
                reconnect_delay = Duration::from_secs(1);
                if sync_loop(&mut sync, settings.interval, &mut shutdown_rx).await {
                    info!("Rig sync shutting down");
                    return;
                }
            }
            Err(e) => warn!("Rig sync setup failed: {}", e),
        }

        tokio::select! {
            _ = time::sleep(reconnect_delay) => {}
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Rig sync shutting down");
                        return;
                    }
                    Ok(()) => {}
                    Err(_) => return,
                }
            }
        }
        reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

async fn connect_and_park(settings: &SyncSettings) -> SyncResult<RigSync> {
    let mut sync = RigSync::connect(settings).await?;
    sync.park_on_if().await?;
    Ok(sync)
}

/// Poll until an error or shutdown. Returns true on shutdown.
async fn sync_loop(
    sync: &mut RigSync,
    interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => return true,
                    Ok(()) => {}
                    Err(_) => return true,
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = sync.poll_once().await {
                    warn!("Rig sync dropped: {}", e);
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    const IF_HZ: u64 = 69_450_000;

    #[derive(Default)]
    struct Fake {
        rig_freq: u64,
        rig_mode: String,
        hw_freq: u64,
        lnb_lo: i64,
        offset: i64,
        log: Vec<String>,
    }

    type Shared = Arc<Mutex<Fake>>;

    fn answer_rig(fake: &Shared, line: &str) -> String {
        let f = fake.lock().unwrap();
        match line {
            "m" => format!("{}\n2400\n", f.rig_mode),
            "f" => format!("{}\n", f.rig_freq),
            _ => "RPRT -1\n".to_string(),
        }
    }

    fn answer_remote(fake: &Shared, line: &str) -> String {
        let mut f = fake.lock().unwrap();
        f.log.push(line.to_string());
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next();
        match (cmd, arg) {
            ("gqrx_get_hw_freq", None) => format!("{}\n", f.hw_freq),
            ("gqrx_get_filter_offset", None) => format!("{}\n", f.offset),
            ("gqrx_set_hw_freq", Some(v)) => {
                f.hw_freq = v.parse().unwrap();
                "RPRT 0\n".to_string()
            }
            ("gqrx_set_filter_offset", Some(v)) => {
                f.offset = v.parse().unwrap();
                "RPRT 0\n".to_string()
            }
            ("LNB_LO", Some(v)) => {
                f.lnb_lo = v.parse().unwrap();
                "RPRT 0\n".to_string()
            }
            _ => "RPRT 1\n".to_string(),
        }
    }

    async fn serve(fake: Shared, answer: fn(&Shared, &str) -> String) -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let fake = fake.clone();
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let reply = answer(&fake, line.trim());
                        if writer.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        Endpoint {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    async fn setup() -> (Shared, SyncSettings) {
        let fake = Arc::new(Mutex::new(Fake {
            rig_freq: 144_000_000,
            rig_mode: "USB".to_string(),
            hw_freq: 100_000_000,
            lnb_lo: 12_345,
            offset: 5_000,
            ..Fake::default()
        }));
        let rig = serve(fake.clone(), answer_rig).await;
        let remote = serve(fake.clone(), answer_remote).await;
        let settings = SyncSettings {
            rig,
            remote,
            if_freq_hz: IF_HZ,
            interval: Duration::from_millis(20),
        };
        (fake, settings)
    }

    #[tokio::test]
    async fn test_park_then_follow_rig() {
        let (fake, settings) = setup().await;
        let mut sync = RigSync::connect(&settings).await.unwrap();

        sync.park_on_if().await.unwrap();
        {
            let f = fake.lock().unwrap();
            assert_eq!(
                f.log,
                vec![
                    "LNB_LO 0",
                    "gqrx_set_filter_offset 0",
                    "gqrx_set_hw_freq 69450000"
                ]
            );
            assert_eq!(f.hw_freq, IF_HZ);
            assert_eq!(f.offset, 0);
        }

        assert_eq!(sync.poll_once().await.unwrap(), Some(74_551_500));
        assert_eq!(fake.lock().unwrap().lnb_lo, 74_551_500);

        // Nothing changed on the rig.
        assert_eq!(sync.poll_once().await.unwrap(), None);

        fake.lock().unwrap().rig_mode = "LSB".to_string();
        assert_eq!(sync.poll_once().await.unwrap(), Some(74_548_500));

        fake.lock().unwrap().rig_freq = 145_000_000;
        fake.lock().unwrap().rig_mode = "FM".to_string();
        assert_eq!(sync.poll_once().await.unwrap(), Some(75_550_000));
    }

    #[tokio::test]
    async fn test_drifted_hardware_is_parked_again() {
        let (fake, settings) = setup().await;
        let mut sync = RigSync::connect(&settings).await.unwrap();
        sync.park_on_if().await.unwrap();
        sync.poll_once().await.unwrap();

        {
            let mut f = fake.lock().unwrap();
            f.hw_freq = 70_000_000;
            f.rig_freq = 432_100_000;
            f.log.clear();
        }
        assert_eq!(sync.poll_once().await.unwrap(), Some(362_651_500));

        let f = fake.lock().unwrap();
        assert!(f.log.contains(&"gqrx_set_hw_freq 69450000".to_string()));
        assert_eq!(f.log.last().map(String::as_str), Some("LNB_LO 362651500"));
        assert_eq!(f.hw_freq, IF_HZ);
    }

    #[tokio::test]
    async fn test_zero_hw_freq_skips_update() {
        let (fake, settings) = setup().await;
        let mut sync = RigSync::connect(&settings).await.unwrap();
        fake.lock().unwrap().hw_freq = 0;
        assert_eq!(sync.poll_once().await.unwrap(), None);
        assert_eq!(fake.lock().unwrap().lnb_lo, 12_345);
    }

    #[tokio::test]
    async fn test_run_sync_until_shutdown() {
        let (fake, settings) = setup().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_sync(settings, shutdown_rx));

        time::timeout(Duration::from_secs(5), async {
            loop {
                if fake.lock().unwrap().lnb_lo == 74_551_500 {
                    break;
                }
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("lnb lo never synced");

        shutdown_tx.send(true).unwrap();
        time::timeout(Duration::from_secs(2), task)
            .await
            .expect("sync shutdown timeout")
            .unwrap();
    }
}
