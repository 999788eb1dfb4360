//! Raw byte-buffer BenchmarkService
//!
//! Requests and responses are plain byte sequences. The codec hands tonic the bytes
//! as they are, so no protobuf encoding or decoding happens on either side and the
//! server measures framing and transport cost only.

use bytes::{Buf, BufMut, Bytes};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::{Request, Response, Status, Streaming};

/// Server and client for the BenchmarkService routes with [`ByteBufCodec`]
pub mod generated {
    tonic::include_proto!("grpc.testing.BenchmarkService");
}

use generated::benchmark_service_server::BenchmarkService;

/// Codec whose messages are the raw gRPC message bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteBufCodec;

#[derive(Debug, Clone, Copy, Default)]
pub struct ByteBufEncoder;

#[derive(Debug, Clone, Copy, Default)]
pub struct ByteBufDecoder;

impl Encoder for ByteBufEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put_slice(&item);
        Ok(())
    }
}

impl Decoder for ByteBufDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let len = src.remaining();
        Ok(Some(src.copy_to_bytes(len)))
    }
}

impl Codec for ByteBufCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = ByteBufEncoder;
    type Decoder = ByteBufDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        ByteBufEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        ByteBufDecoder
    }
}

/// Answers every message with the same zero-filled buffer
#[derive(Debug, Clone)]
pub struct ByteBufService {
    response: Bytes,
}

impl ByteBufService {
    pub fn new(resp_size: usize) -> Self {
        Self {
            response: Bytes::from(vec![0u8; resp_size]),
        }
    }
}

type ResponseStream = Pin<Box<dyn Stream<Item = Result<Bytes, Status>> + Send>>;

#[tonic::async_trait]
impl BenchmarkService for ByteBufService {
    async fn unary_call(&self, _request: Request<Bytes>) -> Result<Response<Bytes>, Status> {
        Ok(Response::new(self.response.clone()))
    }

    type StreamingCallStream = ResponseStream;

    async fn streaming_call(
        &self,
        request: Request<Streaming<Bytes>>,
    ) -> Result<Response<Self::StreamingCallStream>, Status> {
        let response = self.response.clone();
        let responses = request
            .into_inner()
            .map(move |message| message.map(|_| response.clone()));

        Ok(Response::new(Box::pin(responses)))
    }
}
