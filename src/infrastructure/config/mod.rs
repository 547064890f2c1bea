mod settings;

pub use settings::{
    DatabaseConfig, DispatcherConfig, EmailConfig, EmailProvider, LogFormat, LoggingConfig,
    MailgunRegion, OverflowPolicySetting, ServerConfig, Settings, SmsConfig, SmsProvider,
    StorageConfig,
};
