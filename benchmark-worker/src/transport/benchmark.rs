use crate::proto::benchmark_service_server::BenchmarkService;
use crate::proto::{Payload, PayloadType, SimpleRequest, SimpleResponse};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tonic::{Request, Response, Status, Streaming};

/// Protobuf BenchmarkService
///
/// Answers each request with a payload of the requested type and size.
#[derive(Debug, Default)]
pub struct BenchmarkServiceImpl;

impl BenchmarkServiceImpl {
    pub fn new() -> Self {
        Self
    }
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<SimpleResponse, Status>> + Send>>;

#[tonic::async_trait]
impl BenchmarkService for BenchmarkServiceImpl {
    async fn unary_call(
        &self,
        request: Request<SimpleRequest>,
    ) -> Result<Response<SimpleResponse>, Status> {
        let response = simple_response(&request.into_inner())?;
        Ok(Response::new(response))
    }

    type StreamingCallStream = ResponseStream;

    async fn streaming_call(
        &self,
        request: Request<Streaming<SimpleRequest>>,
    ) -> Result<Response<Self::StreamingCallStream>, Status> {
        // One response per request, ends when the client half-closes
        let responses = request
            .into_inner()
            .map(|request| request.and_then(|request| simple_response(&request)));

        Ok(Response::new(Box::pin(responses)))
    }
}

fn simple_response(request: &SimpleRequest) -> Result<SimpleResponse, Status> {
    Ok(SimpleResponse {
        payload: Some(new_payload(request.response_type, request.response_size)?),
        ..Default::default()
    })
}

/// Build a zero-filled payload body of `size` bytes
pub fn new_payload(payload_type: i32, size: i32) -> Result<Payload, Status> {
    let size = usize::try_from(size).map_err(|_| {
        Status::invalid_argument(format!("requested a response with invalid length {size}"))
    })?;

    match PayloadType::try_from(payload_type) {
        Ok(PayloadType::Compressable) => Ok(Payload {
            r#type: payload_type,
            body: vec![0; size],
        }),
        Ok(other) => Err(Status::unimplemented(format!(
            "payload type {} is not supported",
            other.as_str_name()
        ))),
        Err(_) => Err(Status::invalid_argument(format!(
            "unsupported payload type: {payload_type}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_compressable_payload() {
        let payload = new_payload(PayloadType::Compressable as i32, 128).unwrap();
        assert_eq!(payload.body.len(), 128);
        assert!(payload.body.iter().all(|&b| b == 0));
        assert_eq!(payload.r#type, PayloadType::Compressable as i32);
    }

    #[test]
    fn test_empty_payload() {
        let payload = new_payload(PayloadType::Compressable as i32, 0).unwrap();
        assert!(payload.body.is_empty());
    }

    #[test]
    fn test_negative_size_rejected() {
        let status = new_payload(PayloadType::Compressable as i32, -1).unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_uncompressable_unimplemented() {
        let status = new_payload(PayloadType::Uncompressable as i32, 10).unwrap_err();
        assert_eq!(status.code(), Code::Unimplemented);
        assert!(status.message().contains("UNCOMPRESSABLE"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let status = new_payload(42, 10).unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unary_call() {
        let service = BenchmarkServiceImpl::new();
        let request = Request::new(SimpleRequest {
            response_type: PayloadType::Compressable as i32,
            response_size: 64,
            ..Default::default()
        });

        let response = service.unary_call(request).await.unwrap().into_inner();
        assert_eq!(response.payload.unwrap().body.len(), 64);
    }
}
