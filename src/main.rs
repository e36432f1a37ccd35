use anyhow::Result;
use casewatch::data::reshape::IdColumns;
use casewatch::feed::{Endpoints, Fetcher, HttpSource};
use casewatch::logging::{log, obj, v_str, Domain, Level};
use casewatch::pipeline::load_snapshot;
use casewatch::server::{serve, AppState};
use casewatch::state::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("bind_addr", v_str(&cfg.bind_addr)),
            ("url", v_str(&cfg.time_series_url)),
        ]),
    );

    let fetcher = Fetcher::new(HttpSource::new(cfg.fetch_timeout())?, Endpoints::from_config(&cfg)?);

    // The dashboard is only served once the snapshot exists.
    let snapshot = match load_snapshot(&fetcher, &IdColumns::csse()).await {
        Ok(s) => s,
        Err(err) => {
            log(
                Level::Fatal,
                Domain::System,
                "load_failed",
                obj(&[("msg", v_str(&format!("{:#}", err)))]),
            );
            return Err(err);
        }
    };

    serve(&cfg.bind_addr, AppState::new(snapshot, cfg.default_entity.clone())).await
}
