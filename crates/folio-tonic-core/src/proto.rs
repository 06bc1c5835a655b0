//! Protobuf messages and generated gRPC glue.
//!
//! Messages are declared with `prost` derives; the service traits, servers and
//! clients are generated by `build.rs`. Field tags follow the `bookpb` and
//! `computepb` packages so existing clients keep interoperating.

/// The `book` package: title/author lookups in every call shape.
pub mod book {
    use serde::Serialize;

    /// A single catalog record.
    #[derive(Clone, PartialEq, Serialize, ::prost::Message)]
    pub struct Book {
        #[prost(string, tag = "1")]
        pub title: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub subject: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub audience: ::prost::alloc::string::String,
        #[prost(string, tag = "4")]
        pub author: ::prost::alloc::string::String,
        #[prost(float, tag = "5")]
        pub price: f32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetBookRequest {
        #[prost(string, tag = "1")]
        pub title: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetBookByAuthorRequest {
        #[prost(string, tag = "1")]
        pub author: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetBookResponse {
        #[prost(message, optional, tag = "1")]
        pub book: ::core::option::Option<Book>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetAllBooksRequest {
        #[prost(string, tag = "1")]
        pub title: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetAllBooksResponse {
        #[prost(message, optional, tag = "1")]
        pub book: ::core::option::Option<Book>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetBooksForGivenTitlesRequest {
        #[prost(string, tag = "1")]
        pub title: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetBooksForGivenTitlesResponse {
        #[prost(message, repeated, tag = "1")]
        pub book: ::prost::alloc::vec::Vec<Book>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetEachBookRequest {
        #[prost(string, tag = "1")]
        pub title: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetEachBookResponse {
        #[prost(message, optional, tag = "1")]
        pub book: ::core::option::Option<Book>,
    }

    include!(concat!(env!("OUT_DIR"), "/book.BookSearchApi.rs"));
}

/// The `compute` package: arithmetic with validation and deadlines.
pub mod compute {
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct DivideRequest {
        #[prost(int32, tag = "1")]
        pub dividend: i32,
        #[prost(int32, tag = "2")]
        pub divisor: i32,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct DivideResponse {
        #[prost(double, tag = "1")]
        pub result: f64,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct SumRequest {
        #[prost(int32, tag = "1")]
        pub number1: i32,
        #[prost(int32, tag = "2")]
        pub number2: i32,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct SumResponse {
        #[prost(int32, tag = "1")]
        pub result: i32,
    }

    include!(concat!(env!("OUT_DIR"), "/compute.CalculatorApi.rs"));
}
