pub mod alpaca;
pub mod spotify;

pub use alpaca::AlpacaClient;
pub use spotify::SpotifyClient;
