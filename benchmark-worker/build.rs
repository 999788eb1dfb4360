fn main() {
    // Protobuf messages and the structured BenchmarkService
    compile_protos();
    // Same BenchmarkService routes, raw bytes codec
    compile_byte_buf_service();
}

fn compile_protos() {
    println!("cargo:rerun-if-changed=proto/benchmark.proto");

    if let Err(e) = tonic_prost_build::compile_protos("proto/benchmark.proto") {
        println!("cargo:warning=Failed to compile protobuf: {e}");
        println!("cargo:warning=Make sure protoc is installed:");
        println!("cargo:warning=  macOS: brew install protobuf");
        println!("cargo:warning=  Ubuntu: apt-get install protobuf-compiler");
        println!(
            "cargo:warning=  Or download from: https://github.com/protocolbuffers/protobuf/releases"
        );
        panic!("protobuf compilation failed: {e}");
    }
}

fn compile_byte_buf_service() {
    let unary = tonic_build::manual::Method::builder()
        .name("unary_call")
        .route_name("UnaryCall")
        .input_type("::bytes::Bytes")
        .output_type("::bytes::Bytes")
        .codec_path("crate::transport::bytebuf::ByteBufCodec")
        .build();

    let streaming = tonic_build::manual::Method::builder()
        .name("streaming_call")
        .route_name("StreamingCall")
        .input_type("::bytes::Bytes")
        .output_type("::bytes::Bytes")
        .codec_path("crate::transport::bytebuf::ByteBufCodec")
        .client_streaming()
        .server_streaming()
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("BenchmarkService")
        .package("grpc.testing")
        .method(unary)
        .method(streaming)
        .build();

    // Writes grpc.testing.BenchmarkService.rs next to the prost output
    tonic_build::manual::Builder::new().compile(&[service]);
}
