use benchmark_worker::proto::benchmark_service_client::BenchmarkServiceClient;
use benchmark_worker::proto::payload_config::Payload;
use benchmark_worker::proto::{
    ByteBufferParams, PayloadConfig, PayloadType, SecurityParams, ServerConfig, ServerType,
    SimpleProtoParams, SimpleRequest,
};
use benchmark_worker::transport::bytebuf::generated::benchmark_service_client::BenchmarkServiceClient as ByteBufClient;
use benchmark_worker::{BenchmarkServer, PayloadStrategy, WorkerContext};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Certificate, Channel, ClientTlsConfig};

fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn simple_request(size: i32) -> SimpleRequest {
    SimpleRequest {
        response_type: PayloadType::Compressable as i32,
        response_size: size,
        ..Default::default()
    }
}

async fn stop(server: BenchmarkServer) {
    tokio::task::spawn_blocking(move || server.shutdown())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_protobuf_server_on_ephemeral_port() {
    let server = BenchmarkServer::start(&ServerConfig::default(), 0, &WorkerContext::production())
        .await
        .unwrap();
    assert_ne!(server.port(), 0);
    assert_eq!(server.payload(), PayloadStrategy::Protobuf);
    assert!(!server.is_secure());

    let mut client = BenchmarkServiceClient::connect(format!("http://127.0.0.1:{}", server.port()))
        .await
        .unwrap();
    let response = client
        .unary_call(simple_request(100))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.payload.unwrap().body.len(), 100);

    drop(client);
    stop(server).await;
}

#[tokio::test]
async fn test_protobuf_streaming_call() {
    let config = ServerConfig {
        payload_config: Some(PayloadConfig {
            payload: Some(Payload::SimpleParams(SimpleProtoParams {
                req_size: 0,
                resp_size: 0,
            })),
        }),
        ..Default::default()
    };
    let server = BenchmarkServer::start(&config, 0, &WorkerContext::production())
        .await
        .unwrap();

    let mut client = BenchmarkServiceClient::connect(format!("http://127.0.0.1:{}", server.port()))
        .await
        .unwrap();
    let requests = tokio_stream::iter(vec![simple_request(1), simple_request(2), simple_request(3)]);
    let mut responses = client.streaming_call(requests).await.unwrap().into_inner();

    let mut sizes = Vec::new();
    while let Some(response) = responses.message().await.unwrap() {
        sizes.push(response.payload.unwrap().body.len());
    }
    assert_eq!(sizes, vec![1, 2, 3]);

    drop(client);
    stop(server).await;
}

#[tokio::test]
async fn test_byte_buf_server_response_size() {
    let config = ServerConfig {
        payload_config: Some(PayloadConfig {
            payload: Some(Payload::BytebufParams(ByteBufferParams {
                req_size: 5,
                resp_size: 333,
            })),
        }),
        ..Default::default()
    };
    let server = BenchmarkServer::start(&config, 0, &WorkerContext::production())
        .await
        .unwrap();
    assert_eq!(server.payload(), PayloadStrategy::ByteBuf { resp_size: 333 });

    let mut client = ByteBufClient::connect(format!("http://127.0.0.1:{}", server.port()))
        .await
        .unwrap();

    let response = client
        .unary_call(Bytes::from_static(b"hello"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.len(), 333);

    let requests = tokio_stream::iter(vec![Bytes::from_static(b"a"); 4]);
    let mut responses = client.streaming_call(requests).await.unwrap().into_inner();
    let mut count = 0;
    while let Some(message) = responses.message().await.unwrap() {
        assert_eq!(message.len(), 333);
        count += 1;
    }
    assert_eq!(count, 4);

    drop(client);
    stop(server).await;
}

#[tokio::test]
async fn test_secure_server() {
    let config = ServerConfig {
        server_type: ServerType::AsyncServer as i32,
        security_params: Some(SecurityParams::default()),
        ..Default::default()
    };
    let server = BenchmarkServer::start(&config, 0, &WorkerContext::production())
        .await
        .unwrap();
    assert!(server.is_secure());

    // server1.pem is issued by the bundled test CA
    let ca = std::fs::read(benchmark_worker::credentials::abs("testdata/ca.pem")).unwrap();
    let tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(ca))
        .domain_name("localhost");
    let channel = Channel::from_shared(format!("https://127.0.0.1:{}", server.port()))
        .unwrap()
        .tls_config(tls)
        .unwrap()
        .connect()
        .await
        .unwrap();

    let mut client = BenchmarkServiceClient::new(channel);
    let response = client
        .unary_call(simple_request(16))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.payload.unwrap().body.len(), 16);

    drop(client);
    stop(server).await;
}

#[tokio::test]
async fn test_config_port_beats_fallback() {
    let config_port = unused_port();
    let fallback_port = unused_port();
    let config = ServerConfig {
        port: i32::from(config_port),
        ..Default::default()
    };

    let server = BenchmarkServer::start(&config, fallback_port, &WorkerContext::production())
        .await
        .unwrap();
    assert_eq!(server.port(), config_port);
    stop(server).await;
}

#[tokio::test]
async fn test_fallback_port_used() {
    let fallback_port = unused_port();
    let server = BenchmarkServer::start(
        &ServerConfig::default(),
        fallback_port,
        &WorkerContext::production(),
    )
    .await
    .unwrap();
    assert_eq!(server.port(), fallback_port);
    stop(server).await;
}

#[tokio::test]
async fn test_core_limit_resolved() {
    let config = ServerConfig {
        core_limit: 2,
        ..Default::default()
    };
    let server = BenchmarkServer::start(&config, 0, &WorkerContext::production())
        .await
        .unwrap();
    assert_eq!(server.cores().get(), 2);
    stop(server).await;
}

#[tokio::test]
async fn test_port_in_use_is_fatal() {
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let config = ServerConfig {
        port: i32::from(taken.local_addr().unwrap().port()),
        ..Default::default()
    };

    let err = BenchmarkServer::start(&config, 0, &WorkerContext::production())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_stats_while_serving() {
    let server = BenchmarkServer::start(&ServerConfig::default(), 0, &WorkerContext::production())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.get_stats().time_elapsed >= 0.05);

    server.reset();
    let stats = server.get_stats();
    assert!(stats.time_elapsed < 0.05);
    assert_eq!(stats.time_user, 0.0);
    assert_eq!(stats.time_system, 0.0);

    // The listener keeps serving after a reset
    let mut client = BenchmarkServiceClient::connect(format!("http://127.0.0.1:{}", server.port()))
        .await
        .unwrap();
    assert!(client.unary_call(simple_request(1)).await.is_ok());

    drop(client);
    stop(server).await;
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let server = BenchmarkServer::start(&ServerConfig::default(), 0, &WorkerContext::production())
        .await
        .unwrap();
    let port = server.port();
    stop(server).await;

    let result = BenchmarkServiceClient::connect(format!("http://127.0.0.1:{port}")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_shutdown_with_open_stream() {
    let server = BenchmarkServer::start(&ServerConfig::default(), 0, &WorkerContext::production())
        .await
        .unwrap();

    let mut client = BenchmarkServiceClient::connect(format!("http://127.0.0.1:{}", server.port()))
        .await
        .unwrap();
    let (tx, rx) = mpsc::channel(4);
    tx.send(simple_request(8)).await.unwrap();
    let mut responses = client
        .streaming_call(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    let first = responses.message().await.unwrap().unwrap();
    assert_eq!(first.payload.unwrap().body.len(), 8);

    // The request stream stays open while the server stops
    let stopped = tokio::time::timeout(Duration::from_secs(5), stop(server)).await;
    assert!(stopped.is_ok(), "shutdown blocked on an open stream");

    let next = tokio::time::timeout(Duration::from_secs(5), responses.message()).await;
    assert!(!matches!(next, Ok(Ok(Some(_)))));
    drop(tx);
}
