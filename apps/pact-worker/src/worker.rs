use std::time::Duration;

use time::{Date, OffsetDateTime};
use tokio::time as tokio_time;

use pact_service::PactService;

/// Once-a-day expiry sweep, checked on a fixed poll interval.
#[derive(Clone, Copy, Debug)]
pub struct SweepSchedule {
	pub hour_utc: u8,
	pub poll_interval: Duration,
}
impl SweepSchedule {
	pub fn from_config(cfg: &pact_config::Lifecycle) -> Self {
		Self {
			hour_utc: cfg.expiry_sweep_hour_utc,
			poll_interval: Duration::from_secs(cfg.expiry_poll_interval_seconds.max(1)),
		}
	}

	/// Due once the sweep hour has been reached on a day without a successful sweep.
	pub fn is_due(&self, now: OffsetDateTime, last_sweep: Option<Date>) -> bool {
		now.hour() >= self.hour_utc && last_sweep != Some(now.date())
	}
}

pub async fn run_worker(service: &PactService, schedule: SweepSchedule) -> color_eyre::Result<()> {
	let mut last_sweep: Option<Date> = None;

	tracing::info!(hour_utc = schedule.hour_utc, "Expiry worker started.");

	loop {
		let now = OffsetDateTime::now_utc();

		if schedule.is_due(now, last_sweep) {
			match service.expire_contracts(now).await {
				Ok(count) => {
					tracing::info!(count, date = %now.date(), "Expiry sweep finished.");

					last_sweep = Some(now.date());
				},
				Err(err) => tracing::error!(error = %err, "Expiry sweep failed."),
			}
		}

		tokio_time::sleep(schedule.poll_interval).await;
	}
}
