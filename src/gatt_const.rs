use bluer::Uuid;

// Constants for the YuSmart console GATT service
pub const CONSOLE_SERVICE_UUID: Uuid = Uuid::from_u128(0x94f39d297d6d437d973bfba39e49d4ee);
pub const CONSOLE_COMMAND_CHAR_UUID: Uuid = Uuid::from_u128(0x94f39d297d6d437d973bfba39e49d4ef);
pub const CONSOLE_NOTIFY_CHAR_UUID: Uuid = Uuid::from_u128(0x94f39d297d6d437d973bfba39e49d4e0);

//Advertised device name of the console
pub const CONSOLE_NAME: &str = "YuSmart";
