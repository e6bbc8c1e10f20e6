// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background delivery worker.
//!
//! A single task owns all delivery state. Callers hand it error reports and
//! started sessions over two bounded queues. The worker sends reports one at
//! a time, accumulates sessions and publishes them as one batch per tick,
//! and on shutdown drains both queues before a final session flush.

use std::sync::Arc;
use std::time::Duration;

use loom_notifier_core::{ErrorReport, Session};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::{ErrorSink, SessionReportSanitizer, QUEUE_CAPACITY};
use crate::delivery::Transport;
use crate::error::{NotifierError, Result};
use crate::report::ReportAssembler;
use crate::sessions::SessionTracker;

/// Handle to the running worker.
pub struct Dispatcher {
	report_tx: mpsc::Sender<ErrorReport>,
	session_tx: mpsc::Sender<Arc<Session>>,
	shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
	handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

struct Worker {
	transport: Arc<dyn Transport>,
	assembler: Arc<ReportAssembler>,
	session_sanitizer: Option<SessionReportSanitizer>,
	sink: ErrorSink,
	tracker: SessionTracker,
}

impl Dispatcher {
	/// Spawns the worker on the current tokio runtime.
	pub(crate) fn spawn(
		transport: Arc<dyn Transport>,
		assembler: Arc<ReportAssembler>,
		session_sanitizer: Option<SessionReportSanitizer>,
		sink: ErrorSink,
		publish_interval: Duration,
	) -> Result<Self> {
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| NotifierError::NoRuntime)?;

		let (report_tx, report_rx) = mpsc::channel(QUEUE_CAPACITY);
		let (session_tx, session_rx) = mpsc::channel(QUEUE_CAPACITY);
		let (shutdown_tx, shutdown_rx) = oneshot::channel();

		let worker = Worker {
			transport,
			assembler,
			session_sanitizer,
			sink,
			tracker: SessionTracker::new(),
		};
		let period = publish_interval.max(Duration::from_millis(1));
		let handle = runtime.spawn(worker.run(report_rx, session_rx, shutdown_rx, period));

		Ok(Self {
			report_tx,
			session_tx,
			shutdown_tx: Mutex::new(Some(shutdown_tx)),
			handle: tokio::sync::Mutex::new(Some(handle)),
		})
	}

	/// Queues a report, waiting for space if the queue is full.
	pub async fn enqueue_report(&self, report: ErrorReport) -> Result<()> {
		self
			.report_tx
			.send(report)
			.await
			.map_err(|_| NotifierError::Closed { operation: "notify" })
	}

	/// Queues a started session, waiting for space if the queue is full.
	pub async fn enqueue_session(&self, session: Arc<Session>) -> Result<()> {
		self
			.session_tx
			.send(session)
			.await
			.map_err(|_| NotifierError::Closed {
				operation: "start_session",
			})
	}

	/// Signals shutdown and waits for the worker to drain and exit.
	pub async fn shutdown(&self) -> Result<()> {
		let Some(shutdown_tx) = self.shutdown_tx.lock().take() else {
			return Err(NotifierError::Closed { operation: "close" });
		};
		let _ = shutdown_tx.send(());

		let handle = self.handle.lock().await.take();
		if let Some(handle) = handle {
			handle
				.await
				.map_err(|e| NotifierError::WorkerFailed(e.to_string()))?;
		}
		Ok(())
	}
}

impl Worker {
	async fn run(
		mut self,
		mut report_rx: mpsc::Receiver<ErrorReport>,
		mut session_rx: mpsc::Receiver<Arc<Session>>,
		mut shutdown_rx: oneshot::Receiver<()>,
		period: Duration,
	) {
		info!(
			publish_interval_ms = period.as_millis() as u64,
			queue_capacity = QUEUE_CAPACITY,
			"Starting notifier delivery worker"
		);

		let mut ticker = interval_at(Instant::now() + period, period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				Some(report) = report_rx.recv() => self.deliver(report).await,
				Some(session) = session_rx.recv() => self.tracker.track(session),
				_ = ticker.tick() => self.flush_sessions().await,
				_ = &mut shutdown_rx => break,
			}
		}

		report_rx.close();
		while let Some(report) = report_rx.recv().await {
			self.deliver(report).await;
		}
		session_rx.close();
		while let Some(session) = session_rx.recv().await {
			self.tracker.track(session);
		}
		self.flush_sessions().await;

		info!("Notifier delivery worker stopped");
	}

	async fn deliver(&self, report: ErrorReport) {
		match self.transport.send_report(&report).await {
			Ok(()) => debug!("Error report delivered"),
			Err(e) => self.sink.report(e),
		}
	}

	async fn flush_sessions(&mut self) {
		let sessions = self.tracker.take_batch();
		let Some(mut report) = self.assembler.session_report(&sessions) else {
			return;
		};

		if let Some(sanitizer) = &self.session_sanitizer {
			if let Err(reason) = sanitizer(&mut report) {
				self.sink.report(NotifierError::Vetoed {
					kind: "session",
					reason,
				});
				return;
			}
		}

		debug!(count = sessions.len(), "Publishing session batch");
		if let Err(e) = self.transport.send_sessions(&report).await {
			self.sink.report(e);
		}
	}
}
