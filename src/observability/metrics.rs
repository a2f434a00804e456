/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub songs_fetched: Counter,
    pub songs_stored: Counter,
    pub songs_skipped: Counter,
    pub stats_batches_failed: Counter,
    pub songs_picked: Counter,
    pub playlist_inserts_ok: Counter,
    pub playlist_inserts_failed: Counter,
    pub runs_completed: Counter,
    pub runs_failed: Counter,
    pub manual_triggers: Counter,

    // ヒストグラム
    pub fetch_duration: Histogram,
    pub publish_duration: Histogram,
    pub run_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既にレジストリに存在する場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            songs_fetched: register_counter_with_registry!(
                "pickup_songs_fetched_total",
                "Total number of songs returned by the catalog",
                registry
            )?,
            songs_stored: register_counter_with_registry!(
                "pickup_songs_stored_total",
                "Total number of songs written to the song store",
                registry
            )?,
            songs_skipped: register_counter_with_registry!(
                "pickup_songs_skipped_total",
                "Songs skipped by title, age or missing statistics",
                registry
            )?,
            stats_batches_failed: register_counter_with_registry!(
                "pickup_stats_batches_failed_total",
                "Statistics batches that failed and were skipped",
                registry
            )?,
            songs_picked: register_counter_with_registry!(
                "pickup_songs_picked_total",
                "Total number of songs picked across all lists",
                registry
            )?,
            playlist_inserts_ok: register_counter_with_registry!(
                "pickup_playlist_inserts_ok_total",
                "Successful playlist insertions",
                registry
            )?,
            playlist_inserts_failed: register_counter_with_registry!(
                "pickup_playlist_inserts_failed_total",
                "Failed playlist insertions",
                registry
            )?,
            runs_completed: register_counter_with_registry!(
                "pickup_runs_completed_total",
                "Total number of task runs completed",
                registry
            )?,
            runs_failed: register_counter_with_registry!(
                "pickup_runs_failed_total",
                "Total number of task runs failed",
                registry
            )?,
            manual_triggers: register_counter_with_registry!(
                "pickup_manual_triggers_total",
                "Tasks started through the admin API",
                registry
            )?,
            fetch_duration: register_histogram_with_registry!(
                "pickup_fetch_duration_seconds",
                "Duration of the catalog fetch stage",
                registry
            )?,
            publish_duration: register_histogram_with_registry!(
                "pickup_publish_duration_seconds",
                "Duration of the playlist publishing stage",
                registry
            )?,
            run_duration: register_histogram_with_registry!(
                "pickup_run_duration_seconds",
                "Duration of an entire task run",
                registry
            )?,
        })
    }
}
