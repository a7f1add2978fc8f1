use crate::domain::types::TradeSide;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// One intraday trading window in exchange-local time.
#[derive(Debug, Clone, Copy)]
pub struct TradingWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl TradingWindow {
    fn contains(&self, t: NaiveTime) -> bool {
        self.open <= t && t < self.close
    }
}

/// Per-exchange calendar record. Windows are inner-core windows, narrower
/// than the official session, to stay clear of open/close auction volatility.
/// Exchanges with a lunch break carry two windows; a timestamp in the break
/// counts as closed.
#[derive(Debug, Clone)]
pub struct ExchangeRecord {
    pub timezone: Tz,
    pub windows: Vec<TradingWindow>,
    pub holidays: BTreeSet<NaiveDate>,
    /// BUY orders are also hour-gated on these exchanges.
    pub strict_hours: bool,
}

/// Trading-hour lookup for every exchange in the universe, with alias codes
/// resolving to a shared record.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    records: HashMap<&'static str, ExchangeRecord>,
    aliases: HashMap<&'static str, &'static str>,
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("static window time")
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("static holiday date")
}

fn window(open: NaiveTime, close: NaiveTime) -> TradingWindow {
    TradingWindow { open, close }
}

impl Default for MarketCalendar {
    fn default() -> Self {
        let mut records = HashMap::new();

        let us_holidays: BTreeSet<NaiveDate> = [
            d(2025, 1, 1),
            d(2025, 1, 20),
            d(2025, 2, 17),
            d(2025, 4, 18),
            d(2025, 5, 26),
            d(2025, 6, 19),
            d(2025, 7, 4),
            d(2025, 9, 1),
            d(2025, 11, 27),
            d(2025, 12, 25),
            d(2026, 1, 1),
            d(2026, 1, 19),
            d(2026, 2, 16),
            d(2026, 4, 3),
            d(2026, 5, 25),
            d(2026, 6, 19),
            d(2026, 7, 3),
            d(2026, 9, 7),
            d(2026, 11, 26),
            d(2026, 12, 25),
        ]
        .into_iter()
        .collect();

        records.insert(
            "NYSE",
            ExchangeRecord {
                timezone: chrono_tz::America::New_York,
                windows: vec![window(t(10, 0), t(15, 0))],
                holidays: us_holidays,
                strict_hours: false,
            },
        );

        let european_holidays: BTreeSet<NaiveDate> = [
            d(2025, 1, 1),
            d(2025, 4, 18),
            d(2025, 4, 21),
            d(2025, 5, 1),
            d(2025, 12, 24),
            d(2025, 12, 25),
            d(2025, 12, 26),
            d(2025, 12, 31),
            d(2026, 1, 1),
            d(2026, 4, 3),
            d(2026, 4, 6),
            d(2026, 5, 1),
            d(2026, 12, 24),
            d(2026, 12, 25),
            d(2026, 12, 31),
        ]
        .into_iter()
        .collect();

        records.insert(
            "XETRA",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Berlin,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "AMSTERDAM",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Amsterdam,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "PARIS",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Paris,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "BRUSSELS",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Brussels,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "LISBON",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Lisbon,
                windows: vec![window(t(8, 30), t(16, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "MADRID",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Madrid,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "MILAN",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Rome,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "VIENNA",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Vienna,
                windows: vec![window(t(9, 30), t(16, 30))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "LONDON",
            ExchangeRecord {
                timezone: chrono_tz::Europe::London,
                windows: vec![window(t(8, 30), t(16, 0))],
                holidays: [
                    d(2025, 1, 1),
                    d(2025, 4, 18),
                    d(2025, 4, 21),
                    d(2025, 5, 5),
                    d(2025, 5, 26),
                    d(2025, 8, 25),
                    d(2025, 12, 25),
                    d(2025, 12, 26),
                    d(2026, 1, 1),
                    d(2026, 4, 3),
                    d(2026, 4, 6),
                    d(2026, 5, 4),
                    d(2026, 5, 25),
                    d(2026, 8, 31),
                    d(2026, 12, 25),
                    d(2026, 12, 28),
                ]
                .into_iter()
                .collect(),
                strict_hours: false,
            },
        );
        records.insert(
            "SWISS",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Zurich,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "STOCKHOLM",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Stockholm,
                windows: vec![window(t(9, 30), t(17, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "COPENHAGEN",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Copenhagen,
                windows: vec![window(t(9, 30), t(16, 30))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "OSLO",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Oslo,
                windows: vec![window(t(9, 30), t(16, 0))],
                holidays: european_holidays.clone(),
                strict_hours: false,
            },
        );
        records.insert(
            "HELSINKI",
            ExchangeRecord {
                timezone: chrono_tz::Europe::Helsinki,
                windows: vec![window(t(10, 30), t(18, 0))],
                holidays: european_holidays,
                strict_hours: false,
            },
        );
        records.insert(
            "TORONTO",
            ExchangeRecord {
                timezone: chrono_tz::America::Toronto,
                windows: vec![window(t(10, 0), t(15, 30))],
                holidays: [
                    d(2025, 1, 1),
                    d(2025, 7, 1),
                    d(2025, 12, 25),
                    d(2025, 12, 26),
                    d(2026, 1, 1),
                    d(2026, 7, 1),
                    d(2026, 12, 25),
                    d(2026, 12, 28),
                ]
                .into_iter()
                .collect(),
                strict_hours: false,
            },
        );
        records.insert(
            "TOKYO",
            ExchangeRecord {
                timezone: chrono_tz::Asia::Tokyo,
                windows: vec![
                    window(t(9, 30), t(11, 0)),
                    window(t(13, 0), t(14, 30)),
                ],
                holidays: [
                    d(2025, 1, 1),
                    d(2025, 1, 2),
                    d(2025, 1, 3),
                    d(2025, 12, 31),
                    d(2026, 1, 1),
                    d(2026, 1, 2),
                    d(2026, 12, 31),
                ]
                .into_iter()
                .collect(),
                strict_hours: true,
            },
        );
        records.insert(
            "HONGKONG",
            ExchangeRecord {
                timezone: chrono_tz::Asia::Hong_Kong,
                windows: vec![
                    window(t(10, 0), t(11, 30)),
                    window(t(13, 30), t(15, 30)),
                ],
                holidays: [
                    d(2025, 1, 1),
                    d(2025, 12, 25),
                    d(2025, 12, 26),
                    d(2026, 1, 1),
                    d(2026, 12, 25),
                ]
                .into_iter()
                .collect(),
                strict_hours: true,
            },
        );
        records.insert(
            "SYDNEY",
            ExchangeRecord {
                timezone: chrono_tz::Australia::Sydney,
                windows: vec![window(t(10, 30), t(15, 30))],
                holidays: [
                    d(2025, 1, 1),
                    d(2025, 12, 25),
                    d(2025, 12, 26),
                    d(2026, 1, 1),
                    d(2026, 12, 25),
                ]
                .into_iter()
                .collect(),
                strict_hours: true,
            },
        );

        let aliases: HashMap<&'static str, &'static str> = [
            ("NASDAQ", "NYSE"),
            ("NMS", "NYSE"),
            ("NSQ", "NYSE"),
            ("NYQ", "NYSE"),
            ("US", "NYSE"),
            ("GER", "XETRA"),
            ("FRA", "XETRA"),
            ("ETR", "XETRA"),
            ("AMS", "AMSTERDAM"),
            ("AEX", "AMSTERDAM"),
            ("PAR", "PARIS"),
            ("EPA", "PARIS"),
            ("BRU", "BRUSSELS"),
            ("LIS", "LISBON"),
            ("LSE", "LONDON"),
            ("LON", "LONDON"),
            ("SWX", "SWISS"),
            ("VTX", "SWISS"),
            ("STO", "STOCKHOLM"),
            ("CPH", "COPENHAGEN"),
            ("OSL", "OSLO"),
            ("HEL", "HELSINKI"),
            ("TSX", "TORONTO"),
            ("TOR", "TORONTO"),
            ("TYO", "TOKYO"),
            ("JPX", "TOKYO"),
            ("TSE", "TOKYO"),
            ("HKG", "HONGKONG"),
            ("HKEX", "HONGKONG"),
            ("ASX", "SYDNEY"),
            ("SYD", "SYDNEY"),
            ("MCE", "MADRID"),
            ("BME", "MADRID"),
            ("MIL", "MILAN"),
            ("BIT", "MILAN"),
            ("VIE", "VIENNA"),
        ]
        .into_iter()
        .collect();

        Self { records, aliases }
    }
}

impl MarketCalendar {
    pub fn resolve(&self, code: &str) -> Option<&ExchangeRecord> {
        let canonical = self.aliases.get(code).copied().unwrap_or(code);
        self.records.get(canonical)
    }

    /// Whether the exchange is inside a trading window at `now`. Weekends and
    /// holidays are closed regardless of time; a timestamp in a lunch break
    /// falls between windows and is closed.
    pub fn is_open(&self, exchange: &str, now: DateTime<Utc>) -> bool {
        let record = match self.resolve(exchange) {
            Some(record) => record,
            None => {
                warn!(exchange, "unknown exchange code, treating as closed");
                return false;
            }
        };

        let local = now.with_timezone(&record.timezone);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        if record.holidays.contains(&local.date_naive()) {
            return false;
        }
        let time = local.time();
        record.windows.iter().any(|w| w.contains(time))
    }

    /// Whether an order on this exchange must be gated by market hours.
    /// Sells always are; buys only on strict-hours exchanges.
    pub fn should_check_hours(&self, exchange: &str, side: TradeSide) -> bool {
        if side == TradeSide::Sell {
            return true;
        }
        match self.resolve(exchange) {
            Some(record) => record.strict_hours,
            // Unknown exchange: gate conservatively.
            None => true,
        }
    }

    /// Canonical codes of every exchange currently inside a trading window.
    pub fn open_exchanges(&self, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut open: Vec<&'static str> = self
            .records
            .keys()
            .copied()
            .filter(|code| self.is_open(code, now))
            .collect();
        open.sort_unstable();
        open
    }
}
