//! End-to-end tests for the HTTP surface, driving the router in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use qrserve::config::{ServiceConfig, SizingKind};
use qrserve::encoder::{ModuleMatrix, QrcodeEncoder, SymbolEncoder, SymbolParams};
use qrserve::error::EncodingError;
use qrserve::params::PayloadPolicy;
use qrserve::server::{router, AppState};
use qrserve::Pipeline;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn app(config: &ServiceConfig) -> Router {
    router(AppState::from_config(config))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn decode_qr(png: &[u8]) -> (rqrr::MetaData, String) {
    let (meta, bytes) = decode_qr_bytes(png);
    (meta, String::from_utf8(bytes).unwrap())
}

fn decode_qr_bytes(png: &[u8]) -> (rqrr::MetaData, Vec<u8>) {
    let img = image::load_from_memory(png).unwrap().to_luma8();
    let (w, h) = img.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
        img.get_pixel(x as u32, y as u32).0[0]
    });
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "expected exactly one QR code");
    let mut bytes = Vec::new();
    let meta = grids[0].decode_to(&mut bytes).unwrap();
    (meta, bytes)
}

fn png_dimensions(png: &[u8]) -> (u32, u32) {
    image::load_from_memory(png).unwrap().to_rgb8().dimensions()
}

#[tokio::test]
async fn root_and_health() {
    let app = app(&ServiceConfig::default());
    let (status, _, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("QR code service"));

    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn default_request_returns_inline_png() {
    let app = app(&ServiceConfig::default());
    let (status, headers, body) = get(&app, "/qr?data=https://example.com").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    let disposition = &headers[header::CONTENT_DISPOSITION];
    assert_eq!(disposition, "inline; filename=\"qrcode.png\"");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(body[..8], PNG_SIGNATURE);
    assert_eq!(png_dimensions(&body), (300, 300));
}

#[tokio::test]
async fn round_trip_through_a_qr_reader() {
    let app = app(&ServiceConfig::default());
    let (status, _, body) = get(&app, "/qr?data=Hello%2C%20QR%20Code%21").await;
    assert_eq!(status, StatusCode::OK);

    let (_, content) = decode_qr(&body);
    assert_eq!(content, "Hello, QR Code!");
}

#[tokio::test]
async fn raster_matches_requested_dimensions() {
    let app = app(&ServiceConfig::default());
    for (w, h) in [(640, 480), (57, 91), (12, 12), (1, 1), (1000, 333)] {
        let uri = format!("/qr?data=dims&width={w}&height={h}");
        let (status, _, body) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::OK, "{w}x{h}");
        assert_eq!(png_dimensions(&body), (w, h));
    }
}

#[tokio::test]
async fn non_positive_dimensions_are_rejected() {
    let app = app(&ServiceConfig::default());
    for query in ["width=0", "height=-20", "width=-1&height=100"] {
        let uri = format!("/qr?data=x&{query}");
        let (status, headers, body) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body, b"Width and height must be positive integers.");
    }
}

#[tokio::test]
async fn strict_policy_requires_data() {
    let app = app(&ServiceConfig::default());
    for uri in ["/qr", "/qr?data=", "/qr?data=%20%20"] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, b"Parameter 'data' is required.");
    }
}

#[tokio::test]
async fn lenient_policy_encodes_the_default_payload() {
    let config = ServiceConfig {
        payload_policy: PayloadPolicy::Lenient,
        default_payload: "nothing to see".to_string(),
        ..ServiceConfig::default()
    };
    let app = app(&config);
    let (status, _, body) = get(&app, "/qr?data=%20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decode_qr(&body).1, "nothing to see");
}

#[tokio::test]
async fn unknown_error_correction_defaults_to_high() {
    let app = app(&ServiceConfig::default());
    let (status, _, defaulted) = get(&app, "/qr?data=ecc&errorCorrection=Z").await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, high) = get(&app, "/qr?data=ecc&errorCorrection=h").await;
    assert_eq!(defaulted, high);
    let (_, _, low) = get(&app, "/qr?data=ecc&errorCorrection=L").await;
    assert_ne!(defaulted, low);
}

#[tokio::test]
async fn out_of_range_version_and_mask_are_ignored() {
    let app = app(&ServiceConfig::default());
    let (_, _, plain) = get(&app, "/qr?data=range").await;
    let queries = [
        "qrVersion=0",
        "qrVersion=41",
        "maskPattern=8",
        "maskPattern=-1",
        "qrVersion=abc",
    ];
    for query in queries {
        let uri = format!("/qr?data=range&{query}");
        let (status, _, body) = get(&app, &uri).await;
        assert_eq!(status, StatusCode::OK, "{query}");
        assert_eq!(body, plain, "{query}");
    }
}

#[tokio::test]
async fn pinned_version_and_mask_are_honoured() {
    let app = app(&ServiceConfig::default());
    let uri = "/qr?data=pinned&qrVersion=10&maskPattern=3&width=600&height=600&margin=4";
    let (status, _, body) = get(&app, uri).await;
    assert_eq!(status, StatusCode::OK);

    let (meta, content) = decode_qr(&body);
    assert_eq!(content, "pinned");
    assert_eq!(meta.version.0, 10);
    assert_eq!(meta.mask, 3);
}

#[tokio::test]
async fn unencodable_requests_are_client_errors() {
    let app = app(&ServiceConfig::default());
    let long = "A1".repeat(300);
    let uri = format!("/qr?data={long}&qrVersion=1");
    let (status, _, body) = get(&app, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let text = String::from_utf8(body).unwrap();
    assert!(text.starts_with("Data too large for QR code"));

    let (status, _, body) = get(&app, "/qr?data=x&charset=EBCDIC").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"Unsupported charset: EBCDIC");
}

#[tokio::test]
async fn latin1_payload_round_trips() {
    let app = app(&ServiceConfig::default());
    let (status, _, body) = get(&app, "/qr?data=caf%C3%A9&charset=ISO-8859-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decode_qr_bytes(&body).1, vec![b'c', b'a', b'f', 0xE9]);
}

#[tokio::test]
async fn ascii_payload_round_trips() {
    let app = app(&ServiceConfig::default());
    let (status, _, body) = get(&app, "/qr?data=plain&charset=US-ASCII").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decode_qr(&body).1, "plain");
}

#[tokio::test]
async fn charset_is_part_of_the_symbol() {
    let app = app(&ServiceConfig::default());
    let (_, _, utf8) = get(&app, "/qr?data=hello&charset=UTF-8").await;
    let (_, _, latin1) = get(&app, "/qr?data=hello&charset=ISO-8859-1").await;
    let (_, _, ascii) = get(&app, "/qr?data=hello&charset=US-ASCII").await;
    assert_ne!(utf8, latin1);
    assert_ne!(utf8, ascii);
    assert_ne!(latin1, ascii);

    // a reader still gets the same text back from each
    for png in [&utf8, &latin1, &ascii] {
        assert_eq!(decode_qr(png).1, "hello");
    }
}

#[tokio::test]
async fn svg_output_is_standalone_markup() {
    let app = app(&ServiceConfig::default());
    let uri = "/qr?data=svg&format=svg&margin=2&darkColor=%23123456";
    let (status, headers, body) = get(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/svg+xml");
    let disposition = &headers[header::CONTENT_DISPOSITION];
    assert_eq!(disposition, "inline; filename=\"qrcode.svg\"");

    let svg = String::from_utf8(body).unwrap();
    assert!(svg.starts_with("<?xml"));
    // "svg" fits version 1 at level H: 21 modules + 2 * 2 margin
    assert!(svg.contains("viewBox=\"0 0 25 25\""));
    assert!(svg.contains("fill=\"#123456\""));
    assert!(!svg.contains("xlink") && !svg.contains("<image"));
}

#[tokio::test]
async fn output_is_deterministic_and_payload_specific() {
    let app = app(&ServiceConfig::default());
    for fmt in ["png", "svg"] {
        let same = format!("/qr?data=same&format={fmt}");
        let different = format!("/qr?data=different&format={fmt}");
        let (_, _, a) = get(&app, &same).await;
        let (_, _, b) = get(&app, &same).await;
        let (_, _, c) = get(&app, &different).await;
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

#[tokio::test]
async fn per_module_sizing_ignores_width_and_height() {
    let config = ServiceConfig {
        sizing: SizingKind::PerModule,
        pixels_per_module: 5,
        ..ServiceConfig::default()
    };
    let app = app(&config);
    let (status, _, body) = get(&app, "/qr?data=A&width=999&height=10&margin=1").await;
    assert_eq!(status, StatusCode::OK);
    // version 1: (21 + 2) * 5
    assert_eq!(png_dimensions(&body), (115, 115));
}

#[tokio::test]
async fn oversized_raster_is_a_generic_server_error() {
    let config = ServiceConfig {
        max_pixels: 10_000,
        ..ServiceConfig::default()
    };
    let app = app(&config);
    let (status, _, body) = get(&app, "/qr?data=big&width=101&height=100").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Error generating QR code");
}

/// Takes half a second over the payload `slow`, encodes anything else at
/// full speed.
struct SlowEncoder;

impl SymbolEncoder for SlowEncoder {
    fn encode(&self, params: &SymbolParams<'_>) -> Result<ModuleMatrix, EncodingError> {
        if params.payload == "slow" {
            std::thread::sleep(Duration::from_millis(500));
        }
        QrcodeEncoder.encode(params)
    }
}

fn slow_app(timeout: Duration, max_in_flight: usize) -> Router {
    let config = ServiceConfig::default();
    let renderer = Arc::new(config.renderer());
    let pipeline = Pipeline::new(config.validator(), Arc::new(SlowEncoder), renderer);
    let state = AppState::new(pipeline, timeout, 0);
    router(state.with_max_in_flight(max_in_flight))
}

#[tokio::test]
async fn exceeding_the_time_budget_is_a_server_error() {
    let app = slow_app(Duration::from_millis(50), 4);

    let (status, _, body) = get(&app, "/qr?data=slow").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, b"Error generating QR code");
}

#[tokio::test]
async fn busy_workers_hold_back_new_requests() {
    let app = slow_app(Duration::from_millis(100), 1);

    let (status, _, _) = get(&app, "/qr?data=slow").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // the abandoned slow job still holds the only slot
    let (status, _, _) = get(&app, "/qr?data=fast").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let (status, _, body) = get(&app, "/qr?data=fast").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decode_qr(&body).1, "fast");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_cross_talk() {
    let app = app(&ServiceConfig::default());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let payload = format!("request-{i}");
                let uri = format!("/qr?data={payload}");
                let (status, _, body) = get(&app, &uri).await;
                (payload, status, body)
            })
        })
        .collect();

    for handle in handles {
        let (payload, status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode_qr(&body).1, payload);
    }
}
