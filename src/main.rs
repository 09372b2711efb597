use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Parser;
use std::fs::File;
use tracing::{info, level_filters::LevelFilter};
use voipscope::{
    callrecord::{discover_with, CallSession, DiscoveryOptions},
    collector::{CallCollector, CallKeyedRequest, HttpCollector, SearchRequest, TimeRange},
    config::{Cli, Commands, Config},
    get_timestamp, qos, query, sip, utils,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.conf.as_deref())?;

    let mut log_fmt = tracing_subscriber::fmt().with_writer(std::io::stderr);
    if let Some(ref level) = config.log_level {
        if let Ok(lv) = level.as_str().parse::<LevelFilter>() {
            log_fmt = log_fmt.with_max_level(lv);
        }
    }

    let _guard = if let Some(ref log_file) = config.log_file {
        let file = File::create(log_file).with_context(|| format!("create log file {}", log_file))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        log_fmt.with_writer(non_blocking).try_init().ok();
        Some(guard)
    } else {
        log_fmt.try_init().ok();
        None
    };

    let collector = || HttpCollector::new(&config.collector);
    match cli.command {
        Commands::Compile { query } => {
            println!("{}", query::compile(&query)?);
        }
        Commands::Calls {
            query,
            number,
            limit,
            since_minutes,
            until,
        } => {
            let to = until.unwrap_or_else(get_timestamp);
            let range = TimeRange::new(to - since_minutes * 60_000, to);
            let reference = number.or(config.reference_number.clone());
            let calls = discover_with(
                &collector()?,
                range,
                &query,
                reference.as_deref(),
                limit.unwrap_or(config.discovery.max_calls),
                DiscoveryOptions::from(&config.discovery),
            )
            .await?;
            print_calls(&calls);
        }
        Commands::Show {
            call_id,
            index,
            since_minutes,
        } => {
            let request =
                CallKeyedRequest::new(TimeRange::last_minutes(since_minutes), vec![call_id], None);
            let transaction = collector()?.transaction(&request).await?;
            match index {
                Some(index) => println!("{}", transaction.message(index)?.raw),
                None => {
                    for (i, message) in transaction.messages().iter().enumerate() {
                        let user_agent =
                            sip::format_user_agent(&sip::extract_header(&message.raw, "User-Agent"));
                        println!(
                            "#{:<3} {} {}:{} -> {}:{}  {}  {}  {}",
                            i,
                            format_time(message.create_date),
                            message.src_ip,
                            message.src_port,
                            message.dst_ip,
                            message.dst_port,
                            sip::start_line(&message.raw),
                            sip::extract_media_summary(&message.raw),
                            user_agent,
                        );
                    }
                }
            }
        }
        Commands::Qos {
            call_ids,
            since_minutes,
        } => {
            let request = CallKeyedRequest::new(TimeRange::last_minutes(since_minutes), call_ids, None);
            let response = collector()?.qos(&request).await?;
            let streams = qos::aggregate(
                response.reports(),
                config.qos.clock_rate_hz,
                config.qos.assumed_latency_ms,
            );
            if streams.is_empty() {
                println!("no quality reports");
            }
            for stream in &streams {
                println!(
                    "{}  {}  reports={} packets={} lost={} loss={:.2}% jitter avg={:.2}ms max={:.2}ms MOS={:.2} ({})",
                    stream.call_id,
                    stream.key,
                    stream.report_count,
                    stream.packets,
                    stream.packets_lost,
                    stream.loss_percent,
                    stream.avg_jitter_ms,
                    stream.max_jitter_ms,
                    stream.mos,
                    stream.quality().as_str(),
                );
            }
        }
        Commands::Export {
            call_ids,
            out,
            since_minutes,
        } => {
            let smartinput = call_ids
                .iter()
                .map(|id| query::equality("sid", id))
                .collect::<Result<Vec<_>, _>>()?
                .join(" OR ");
            let out = out.unwrap_or_else(|| format!("{}.pcap", utils::sanitize_id(&call_ids[0])));
            let request = SearchRequest::new(
                TimeRange::last_minutes(since_minutes),
                &smartinput,
                config.discovery.page_limit,
            );
            let capture = collector()?.export_pcap(&request).await?;
            std::fs::write(&out, &capture).with_context(|| format!("write {}", out))?;
            info!(path = %out, bytes = capture.len(), "exported capture");
            println!("{}", out);
        }
        Commands::Health => {
            collector()?.health_check().await?;
            println!("collector ok");
        }
    }
    Ok(())
}

fn format_time(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_calls(calls: &[CallSession]) {
    if calls.is_empty() {
        println!("no calls found");
        return;
    }
    for call in calls {
        println!(
            "{}  {:>8.1}s  {:<4} {:<10} {} -> {}  ({} msgs)  {}",
            format_time(call.start_time),
            call.duration_ms as f64 / 1000.0,
            call.direction.as_str(),
            call.status.as_str(),
            call.caller,
            call.callee,
            call.record_count,
            call.call_id,
        );
    }
}
