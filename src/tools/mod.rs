pub mod similar_products;
pub mod youtube_search;
