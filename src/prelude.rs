// 1. Traits
pub use crate::calendar::SessionCalendar;
pub use crate::store::daily::DailyBarReader;

// 2. The Query Types
pub use crate::portal::{
    DataPortal, last_traded::LastTradedResolver, window::WindowMinuteCounter,
};
pub use crate::store::{
    AssetMinuteSeries, MinuteBarStore, MinuteBarStoreBuilder, MinuteRow,
    daily::MinuteDerivedDailyBars,
};

// 3. Calendar & Domain Types
pub use crate::calendar::{
    Session, SessionIdx,
    exchange::{CalendarPreset, ExchangeCalendar, ExchangeCalendarBuilder},
    minute_index::{MinuteIndex, MinutePosition},
};
pub use crate::data::bar::{Bar, BarRecord};
pub use crate::data::domain::{AssetId, BarField, Granularity, Price, Volume};

// 4. Configuration
pub use crate::config::{CalendarConfig, PortalConfig, SearchStrategy};

// 5. Errors
pub use crate::error::{
    CalendarError, CalendarResult, ConfigError, DataError, IoError, PortalError, PortalResult,
    SystemError,
};
