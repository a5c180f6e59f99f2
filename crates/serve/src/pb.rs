//! Wire types for the firehose gRPC surface.
//!
//! Vendored `tonic-build` output (servers only) for `sf.firehose.v2` and
//! the legacy `sf.firehose.v1` schema, committed so downstream builds do
//! not need `protoc`.
#![allow(missing_docs, unreachable_pub)]

/// `sf.firehose.v2` messages and services.
pub mod v2 {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(int64, tag = "1")]
        pub start_block_num: i64,
        #[prost(string, tag = "2")]
        pub cursor: ::prost::alloc::string::String,
        #[prost(uint64, tag = "3")]
        pub stop_block_num: u64,
        #[prost(bool, tag = "4")]
        pub final_blocks_only: bool,
        #[prost(message, repeated, tag = "10")]
        pub transforms: ::prost::alloc::vec::Vec<::prost_types::Any>,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub block: ::core::option::Option<::prost_types::Any>,
        #[prost(enumeration = "ForkStep", tag = "6")]
        pub step: i32,
        #[prost(string, tag = "10")]
        pub cursor: ::prost::alloc::string::String,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SingleBlockRequest {
        #[prost(message, repeated, tag = "6")]
        pub transforms: ::prost::alloc::vec::Vec<::prost_types::Any>,
        #[prost(oneof = "single_block_request::Reference", tags = "3, 4, 5")]
        pub reference: ::core::option::Option<single_block_request::Reference>,
    }
    /// Nested message and enum types in `SingleBlockRequest`.
    pub mod single_block_request {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct BlockNumber {
            #[prost(uint64, tag = "1")]
            pub num: u64,
        }
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct BlockHashAndNumber {
            #[prost(uint64, tag = "1")]
            pub num: u64,
            #[prost(string, tag = "2")]
            pub hash: ::prost::alloc::string::String,
        }
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Cursor {
            #[prost(string, tag = "1")]
            pub cursor: ::prost::alloc::string::String,
        }
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Reference {
            #[prost(message, tag = "3")]
            BlockNumber(BlockNumber),
            #[prost(message, tag = "4")]
            BlockHashAndNumber(BlockHashAndNumber),
            #[prost(message, tag = "5")]
            Cursor(Cursor),
        }
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SingleBlockResponse {
        #[prost(message, optional, tag = "1")]
        pub block: ::core::option::Option<::prost_types::Any>,
    }
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ForkStep {
        StepUnset = 0,
        /// Block is new head block of the chain, that is linear with the previous block.
        StepNew = 1,
        /// Block is now forked and should be undone.
        StepUndo = 2,
        /// Block is now irreversible and should be handled as final.
        StepFinal = 3,
    }
    impl ForkStep {
        /// String value of the enum field names used in the ProtoBuf definition.
        ///
        /// The values are not transformed in any way and thus are considered stable
        /// (if the ProtoBuf definition does not change) and safe for programmatic use.
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Self::StepUnset => "STEP_UNSET",
                Self::StepNew => "STEP_NEW",
                Self::StepUndo => "STEP_UNDO",
                Self::StepFinal => "STEP_FINAL",
            }
        }
        /// Creates an enum from field names used in the ProtoBuf definition.
        pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
            match value {
                "STEP_UNSET" => Some(Self::StepUnset),
                "STEP_NEW" => Some(Self::StepNew),
                "STEP_UNDO" => Some(Self::StepUndo),
                "STEP_FINAL" => Some(Self::StepFinal),
                _ => None,
            }
        }
    }
    /// Generated server implementations.
    pub mod stream_server {
        #![allow(
            unused_variables,
            dead_code,
            missing_docs,
            clippy::wildcard_imports,
            clippy::let_unit_value
        )]
        use tonic::codegen::*;
        /// Generated trait containing gRPC methods that should be implemented for use with StreamServer.
        #[async_trait]
        pub trait Stream: std::marker::Send + std::marker::Sync + 'static {
            /// Server streaming response type for the Blocks method.
            type BlocksStream: tonic::codegen::tokio_stream::Stream<
                    Item = std::result::Result<super::Response, tonic::Status>,
                > + std::marker::Send
                + 'static;
            async fn blocks(
                &self,
                request: tonic::Request<super::Request>,
            ) -> std::result::Result<tonic::Response<Self::BlocksStream>, tonic::Status>;
        }
        #[derive(Debug)]
        pub struct StreamServer<T> {
            inner: Arc<T>,
            accept_compression_encodings: EnabledCompressionEncodings,
            send_compression_encodings: EnabledCompressionEncodings,
            max_decoding_message_size: Option<usize>,
            max_encoding_message_size: Option<usize>,
        }
        impl<T> StreamServer<T> {
            pub fn new(inner: T) -> Self {
                Self::from_arc(Arc::new(inner))
            }
            pub fn from_arc(inner: Arc<T>) -> Self {
                Self {
                    inner,
                    accept_compression_encodings: Default::default(),
                    send_compression_encodings: Default::default(),
                    max_decoding_message_size: None,
                    max_encoding_message_size: None,
                }
            }
            pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
            where
                F: tonic::service::Interceptor,
            {
                InterceptedService::new(Self::new(inner), interceptor)
            }
            /// Enable decompressing requests with the given encoding.
            #[must_use]
            pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
                self.accept_compression_encodings.enable(encoding);
                self
            }
            /// Compress responses with the given encoding, if the client supports it.
            #[must_use]
            pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
                self.send_compression_encodings.enable(encoding);
                self
            }
            /// Limits the maximum size of a decoded message.
            #[must_use]
            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.max_decoding_message_size = Some(limit);
                self
            }
            /// Limits the maximum size of an encoded message.
            #[must_use]
            pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                self.max_encoding_message_size = Some(limit);
                self
            }
        }
        impl<T, B> tonic::codegen::Service<http::Request<B>> for StreamServer<T>
        where
            T: Stream,
            B: Body + std::marker::Send + 'static,
            B::Error: Into<StdError> + std::marker::Send + 'static,
        {
            type Response = http::Response<tonic::body::BoxBody>;
            type Error = std::convert::Infallible;
            type Future = BoxFuture<Self::Response, Self::Error>;
            fn poll_ready(
                &mut self,
                _cx: &mut Context<'_>,
            ) -> Poll<std::result::Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }
            fn call(&mut self, req: http::Request<B>) -> Self::Future {
                match req.uri().path() {
                    "/sf.firehose.v2.Stream/Blocks" => {
                        #[allow(non_camel_case_types)]
                        struct BlocksSvc<T: Stream>(pub Arc<T>);
                        impl<T: Stream> tonic::server::ServerStreamingService<super::Request>
                        for BlocksSvc<T> {
                            type Response = super::Response;
                            type ResponseStream = T::BlocksStream;
                            type Future = BoxFuture<
                                tonic::Response<Self::ResponseStream>,
                                tonic::Status,
                            >;
                            fn call(
                                &mut self,
                                request: tonic::Request<super::Request>,
                            ) -> Self::Future {
                                let inner = Arc::clone(&self.0);
                                let fut = async move {
                                    <T as Stream>::blocks(&inner, request).await
                                };
                                Box::pin(fut)
                            }
                        }
                        let accept_compression_encodings = self.accept_compression_encodings;
                        let send_compression_encodings = self.send_compression_encodings;
                        let max_decoding_message_size = self.max_decoding_message_size;
                        let max_encoding_message_size = self.max_encoding_message_size;
                        let inner = self.inner.clone();
                        let fut = async move {
                            let method = BlocksSvc(inner);
                            let codec = tonic::codec::ProstCodec::default();
                            let mut grpc = tonic::server::Grpc::new(codec)
                                .apply_compression_config(
                                    accept_compression_encodings,
                                    send_compression_encodings,
                                )
                                .apply_max_message_size_config(
                                    max_decoding_message_size,
                                    max_encoding_message_size,
                                );
                            let res = grpc.server_streaming(method, req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    _ => {
                        Box::pin(async move {
                            let mut response = http::Response::new(empty_body());
                            let headers = response.headers_mut();
                            headers
                                .insert(
                                    tonic::Status::GRPC_STATUS,
                                    (tonic::Code::Unimplemented as i32).into(),
                                );
                            headers
                                .insert(
                                    http::header::CONTENT_TYPE,
                                    tonic::metadata::GRPC_CONTENT_TYPE,
                                );
                            Ok(response)
                        })
                    }
                }
            }
        }
        impl<T> Clone for StreamServer<T> {
            fn clone(&self) -> Self {
                let inner = self.inner.clone();
                Self {
                    inner,
                    accept_compression_encodings: self.accept_compression_encodings,
                    send_compression_encodings: self.send_compression_encodings,
                    max_decoding_message_size: self.max_decoding_message_size,
                    max_encoding_message_size: self.max_encoding_message_size,
                }
            }
        }
        /// Generated gRPC service name
        pub const SERVICE_NAME: &str = "sf.firehose.v2.Stream";
        impl<T> tonic::server::NamedService for StreamServer<T> {
            const NAME: &'static str = SERVICE_NAME;
        }
    }
    /// Generated server implementations.
    pub mod fetch_server {
        #![allow(
            unused_variables,
            dead_code,
            missing_docs,
            clippy::wildcard_imports,
            clippy::let_unit_value
        )]
        use tonic::codegen::*;
        /// Generated trait containing gRPC methods that should be implemented for use with FetchServer.
        #[async_trait]
        pub trait Fetch: std::marker::Send + std::marker::Sync + 'static {
            async fn block(
                &self,
                request: tonic::Request<super::SingleBlockRequest>,
            ) -> std::result::Result<tonic::Response<super::SingleBlockResponse>, tonic::Status>;
        }
        #[derive(Debug)]
        pub struct FetchServer<T> {
            inner: Arc<T>,
            accept_compression_encodings: EnabledCompressionEncodings,
            send_compression_encodings: EnabledCompressionEncodings,
            max_decoding_message_size: Option<usize>,
            max_encoding_message_size: Option<usize>,
        }
        impl<T> FetchServer<T> {
            pub fn new(inner: T) -> Self {
                Self::from_arc(Arc::new(inner))
            }
            pub fn from_arc(inner: Arc<T>) -> Self {
                Self {
                    inner,
                    accept_compression_encodings: Default::default(),
                    send_compression_encodings: Default::default(),
                    max_decoding_message_size: None,
                    max_encoding_message_size: None,
                }
            }
            pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
            where
                F: tonic::service::Interceptor,
            {
                InterceptedService::new(Self::new(inner), interceptor)
            }
            /// Enable decompressing requests with the given encoding.
            #[must_use]
            pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
                self.accept_compression_encodings.enable(encoding);
                self
            }
            /// Compress responses with the given encoding, if the client supports it.
            #[must_use]
            pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
                self.send_compression_encodings.enable(encoding);
                self
            }
            /// Limits the maximum size of a decoded message.
            #[must_use]
            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.max_decoding_message_size = Some(limit);
                self
            }
            /// Limits the maximum size of an encoded message.
            #[must_use]
            pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                self.max_encoding_message_size = Some(limit);
                self
            }
        }
        impl<T, B> tonic::codegen::Service<http::Request<B>> for FetchServer<T>
        where
            T: Fetch,
            B: Body + std::marker::Send + 'static,
            B::Error: Into<StdError> + std::marker::Send + 'static,
        {
            type Response = http::Response<tonic::body::BoxBody>;
            type Error = std::convert::Infallible;
            type Future = BoxFuture<Self::Response, Self::Error>;
            fn poll_ready(
                &mut self,
                _cx: &mut Context<'_>,
            ) -> Poll<std::result::Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }
            fn call(&mut self, req: http::Request<B>) -> Self::Future {
                match req.uri().path() {
                    "/sf.firehose.v2.Fetch/Block" => {
                        #[allow(non_camel_case_types)]
                        struct BlockSvc<T: Fetch>(pub Arc<T>);
                        impl<T: Fetch> tonic::server::UnaryService<super::SingleBlockRequest>
                        for BlockSvc<T> {
                            type Response = super::SingleBlockResponse;
                            type Future = BoxFuture<
                                tonic::Response<Self::Response>,
                                tonic::Status,
                            >;
                            fn call(
                                &mut self,
                                request: tonic::Request<super::SingleBlockRequest>,
                            ) -> Self::Future {
                                let inner = Arc::clone(&self.0);
                                let fut = async move {
                                    <T as Fetch>::block(&inner, request).await
                                };
                                Box::pin(fut)
                            }
                        }
                        let accept_compression_encodings = self.accept_compression_encodings;
                        let send_compression_encodings = self.send_compression_encodings;
                        let max_decoding_message_size = self.max_decoding_message_size;
                        let max_encoding_message_size = self.max_encoding_message_size;
                        let inner = self.inner.clone();
                        let fut = async move {
                            let method = BlockSvc(inner);
                            let codec = tonic::codec::ProstCodec::default();
                            let mut grpc = tonic::server::Grpc::new(codec)
                                .apply_compression_config(
                                    accept_compression_encodings,
                                    send_compression_encodings,
                                )
                                .apply_max_message_size_config(
                                    max_decoding_message_size,
                                    max_encoding_message_size,
                                );
                            let res = grpc.unary(method, req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    _ => {
                        Box::pin(async move {
                            let mut response = http::Response::new(empty_body());
                            let headers = response.headers_mut();
                            headers
                                .insert(
                                    tonic::Status::GRPC_STATUS,
                                    (tonic::Code::Unimplemented as i32).into(),
                                );
                            headers
                                .insert(
                                    http::header::CONTENT_TYPE,
                                    tonic::metadata::GRPC_CONTENT_TYPE,
                                );
                            Ok(response)
                        })
                    }
                }
            }
        }
        impl<T> Clone for FetchServer<T> {
            fn clone(&self) -> Self {
                let inner = self.inner.clone();
                Self {
                    inner,
                    accept_compression_encodings: self.accept_compression_encodings,
                    send_compression_encodings: self.send_compression_encodings,
                    max_decoding_message_size: self.max_decoding_message_size,
                    max_encoding_message_size: self.max_encoding_message_size,
                }
            }
        }
        /// Generated gRPC service name
        pub const SERVICE_NAME: &str = "sf.firehose.v2.Fetch";
        impl<T> tonic::server::NamedService for FetchServer<T> {
            const NAME: &'static str = SERVICE_NAME;
        }
    }
}

/// Legacy `sf.firehose.v1` messages and service.
pub mod v1 {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(int64, tag = "1")]
        pub start_block_num: i64,
        #[prost(string, tag = "13")]
        pub start_cursor: ::prost::alloc::string::String,
        #[prost(uint64, tag = "5")]
        pub stop_block_num: u64,
        #[prost(enumeration = "ForkStep", repeated, tag = "8")]
        pub fork_steps: ::prost::alloc::vec::Vec<i32>,
        #[prost(message, repeated, tag = "10")]
        pub transforms: ::prost::alloc::vec::Vec<::prost_types::Any>,
    }
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub block: ::core::option::Option<::prost_types::Any>,
        #[prost(enumeration = "ForkStep", tag = "6")]
        pub step: i32,
        #[prost(string, tag = "10")]
        pub cursor: ::prost::alloc::string::String,
    }
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ForkStep {
        StepUnknown = 0,
        StepNew = 1,
        StepUndo = 2,
        /// Block is now irreversible and can be committed to (finality is chain specific,
        /// see chain documentation for more details)
        StepIrreversible = 4,
    }
    impl ForkStep {
        /// String value of the enum field names used in the ProtoBuf definition.
        ///
        /// The values are not transformed in any way and thus are considered stable
        /// (if the ProtoBuf definition does not change) and safe for programmatic use.
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Self::StepUnknown => "STEP_UNKNOWN",
                Self::StepNew => "STEP_NEW",
                Self::StepUndo => "STEP_UNDO",
                Self::StepIrreversible => "STEP_IRREVERSIBLE",
            }
        }
        /// Creates an enum from field names used in the ProtoBuf definition.
        pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
            match value {
                "STEP_UNKNOWN" => Some(Self::StepUnknown),
                "STEP_NEW" => Some(Self::StepNew),
                "STEP_UNDO" => Some(Self::StepUndo),
                "STEP_IRREVERSIBLE" => Some(Self::StepIrreversible),
                _ => None,
            }
        }
    }
    /// Generated server implementations.
    pub mod stream_server {
        #![allow(
            unused_variables,
            dead_code,
            missing_docs,
            clippy::wildcard_imports,
            clippy::let_unit_value
        )]
        use tonic::codegen::*;
        /// Generated trait containing gRPC methods that should be implemented for use with StreamServer.
        #[async_trait]
        pub trait Stream: std::marker::Send + std::marker::Sync + 'static {
            /// Server streaming response type for the Blocks method.
            type BlocksStream: tonic::codegen::tokio_stream::Stream<
                    Item = std::result::Result<super::Response, tonic::Status>,
                > + std::marker::Send
                + 'static;
            async fn blocks(
                &self,
                request: tonic::Request<super::Request>,
            ) -> std::result::Result<tonic::Response<Self::BlocksStream>, tonic::Status>;
        }
        #[derive(Debug)]
        pub struct StreamServer<T> {
            inner: Arc<T>,
            accept_compression_encodings: EnabledCompressionEncodings,
            send_compression_encodings: EnabledCompressionEncodings,
            max_decoding_message_size: Option<usize>,
            max_encoding_message_size: Option<usize>,
        }
        impl<T> StreamServer<T> {
            pub fn new(inner: T) -> Self {
                Self::from_arc(Arc::new(inner))
            }
            pub fn from_arc(inner: Arc<T>) -> Self {
                Self {
                    inner,
                    accept_compression_encodings: Default::default(),
                    send_compression_encodings: Default::default(),
                    max_decoding_message_size: None,
                    max_encoding_message_size: None,
                }
            }
            pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
            where
                F: tonic::service::Interceptor,
            {
                InterceptedService::new(Self::new(inner), interceptor)
            }
            /// Enable decompressing requests with the given encoding.
            #[must_use]
            pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
                self.accept_compression_encodings.enable(encoding);
                self
            }
            /// Compress responses with the given encoding, if the client supports it.
            #[must_use]
            pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
                self.send_compression_encodings.enable(encoding);
                self
            }
            /// Limits the maximum size of a decoded message.
            #[must_use]
            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.max_decoding_message_size = Some(limit);
                self
            }
            /// Limits the maximum size of an encoded message.
            #[must_use]
            pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                self.max_encoding_message_size = Some(limit);
                self
            }
        }
        impl<T, B> tonic::codegen::Service<http::Request<B>> for StreamServer<T>
        where
            T: Stream,
            B: Body + std::marker::Send + 'static,
            B::Error: Into<StdError> + std::marker::Send + 'static,
        {
            type Response = http::Response<tonic::body::BoxBody>;
            type Error = std::convert::Infallible;
            type Future = BoxFuture<Self::Response, Self::Error>;
            fn poll_ready(
                &mut self,
                _cx: &mut Context<'_>,
            ) -> Poll<std::result::Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }
            fn call(&mut self, req: http::Request<B>) -> Self::Future {
                match req.uri().path() {
                    "/sf.firehose.v1.Stream/Blocks" => {
                        #[allow(non_camel_case_types)]
                        struct BlocksSvc<T: Stream>(pub Arc<T>);
                        impl<T: Stream> tonic::server::ServerStreamingService<super::Request>
                        for BlocksSvc<T> {
                            type Response = super::Response;
                            type ResponseStream = T::BlocksStream;
                            type Future = BoxFuture<
                                tonic::Response<Self::ResponseStream>,
                                tonic::Status,
                            >;
                            fn call(
                                &mut self,
                                request: tonic::Request<super::Request>,
                            ) -> Self::Future {
                                let inner = Arc::clone(&self.0);
                                let fut = async move {
                                    <T as Stream>::blocks(&inner, request).await
                                };
                                Box::pin(fut)
                            }
                        }
                        let accept_compression_encodings = self.accept_compression_encodings;
                        let send_compression_encodings = self.send_compression_encodings;
                        let max_decoding_message_size = self.max_decoding_message_size;
                        let max_encoding_message_size = self.max_encoding_message_size;
                        let inner = self.inner.clone();
                        let fut = async move {
                            let method = BlocksSvc(inner);
                            let codec = tonic::codec::ProstCodec::default();
                            let mut grpc = tonic::server::Grpc::new(codec)
                                .apply_compression_config(
                                    accept_compression_encodings,
                                    send_compression_encodings,
                                )
                                .apply_max_message_size_config(
                                    max_decoding_message_size,
                                    max_encoding_message_size,
                                );
                            let res = grpc.server_streaming(method, req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    _ => {
                        Box::pin(async move {
                            let mut response = http::Response::new(empty_body());
                            let headers = response.headers_mut();
                            headers
                                .insert(
                                    tonic::Status::GRPC_STATUS,
                                    (tonic::Code::Unimplemented as i32).into(),
                                );
                            headers
                                .insert(
                                    http::header::CONTENT_TYPE,
                                    tonic::metadata::GRPC_CONTENT_TYPE,
                                );
                            Ok(response)
                        })
                    }
                }
            }
        }
        impl<T> Clone for StreamServer<T> {
            fn clone(&self) -> Self {
                let inner = self.inner.clone();
                Self {
                    inner,
                    accept_compression_encodings: self.accept_compression_encodings,
                    send_compression_encodings: self.send_compression_encodings,
                    max_decoding_message_size: self.max_decoding_message_size,
                    max_encoding_message_size: self.max_encoding_message_size,
                }
            }
        }
        /// Generated gRPC service name
        pub const SERVICE_NAME: &str = "sf.firehose.v1.Stream";
        impl<T> tonic::server::NamedService for StreamServer<T> {
            const NAME: &'static str = SERVICE_NAME;
        }
    }
}
