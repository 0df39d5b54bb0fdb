pub mod loader;
pub mod preprocess;
pub mod types;

pub use loader::{parse_date, quotes_from_dataframe, trading_dates, DataLoader, LoaderError, EXPECTED_COLUMNS};
pub use preprocess::{preprocess, preprocess_quote, time_to_maturity, DAYS_PER_YEAR};
pub use types::{ChainRow, ContractKey, DayChain, MarketData, OptionType, RawQuote};
