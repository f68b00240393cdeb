use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("guitar_share_api=info,tower_http=warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

pub async fn request_logger(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Blob downloads are high volume and carry no payload worth logging.
    let is_blob = path.contains("/blobs/");
    let payload = extract_compact_payload(&mut request).await;

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if is_blob {
        return response;
    }

    let duration_ms = duration.as_secs_f64() * 1000.0;
    let log_line = format!(
        "{} {} {} {:05.2}ms {}",
        method,
        path,
        status.as_u16(),
        duration_ms,
        payload.unwrap_or_else(|| "{}".to_string())
    );

    match status.as_u16() {
        200..=299 => info!("{}", log_line),
        400..=499 => warn!("{}", log_line),
        500..=599 => error!("{}", log_line),
        _ => info!("{}", log_line),
    }

    response
}

async fn extract_compact_payload(request: &mut Request<Body>) -> Option<String> {
    if request.method() != axum::http::Method::POST {
        return None;
    }

    let body = std::mem::replace(request.body_mut(), Body::empty());
    let bytes = axum::body::to_bytes(body, usize::MAX).await.ok()?;

    let compact = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(&bytes).trim().to_string(),
    };

    *request.body_mut() = Body::from(bytes);

    Some(compact)
}

pub fn log_panic(info: &std::panic::PanicHookInfo) {
    let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    };

    let location = if let Some(loc) = info.location() {
        format!("{}:{}:{}", loc.file(), loc.line(), loc.column())
    } else {
        "unknown location".to_string()
    };

    error!("PANIC at {}: {}", location, payload);
}

pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_panic(info);
        default_hook(info);
    }));
}
