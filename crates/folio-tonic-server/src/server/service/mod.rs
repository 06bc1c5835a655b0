pub mod book;
pub mod compute;

pub use book::BookSearchService;
pub use compute::CalculatorService;
