use chrono::NaiveDate;
use fractic_server_error::{define_client_error, define_internal_error};

// IO-related.
define_client_error!(ReadError, "Error reading file.");
define_internal_error!(WriteError, "Error writing file '{path}'.", { path: &str });
define_client_error!(InvalidConfig, "Invalid configuration: {details}.", { details: &str });

// Parsing-related.
define_client_error!(InvalidCsv, "Invalid CSV format.");
define_client_error!(InvalidCsvContent, "Invalid CSV content: {details}.", { details: &str });
define_client_error!(InvalidRon, "Invalid {ron_type} (invalid RON format).", { ron_type: &str });
define_client_error!(InvalidIsoCurrencyCode, "Invalid ISO currency code: {code}.", { code: &str });
define_client_error!(InvalidCashBreakdown, "Invalid cash breakdown: {details}.", { details: &str });
define_client_error!(UnknownValue, "Unknown {kind} '{value}'.", { kind: &str, value: &str });
define_client_error!(InvalidSignature, "Invalid signature image for '{role}'.", { role: &str });

// Storage-related.
define_internal_error!(DatabaseError, "Database operation failed: {action}.", { action: &str });
define_client_error!(
    EntityNotFound,
    "{entity} '{key}' does not exist.",
    { entity: &str, key: &str }
);

// Input validation.
define_client_error!(InvalidInput, "Invalid {field}: {details}.", { field: &str, details: &str });
define_client_error!(
    DuplicateEntity,
    "{entity} '{key}' already exists.",
    { entity: &str, key: &str }
);
define_client_error!(
    LocationInUse,
    "Location '{name}' still has business days and cannot be deleted.",
    { name: &str }
);
define_client_error!(
    InvalidCategoryRule,
    "Invalid rule for category '{name}': {details}.",
    { name: &str, details: &str }
);

// Access control.
define_client_error!(InvalidCredentials, "Invalid username or password.");
define_internal_error!(PasswordHashError, "Password hashing failed: {details}.", { details: &str });
define_client_error!(
    PermissionDenied,
    "User '{username}' lacks the '{permission}' permission.",
    { username: &str, permission: &str }
);

// Day lifecycle.
define_client_error!(
    DayAlreadyStarted,
    "Location '{location}' already has a business day for {date}.",
    { location: &str, date: &NaiveDate }
);
define_client_error!(
    InvalidDayStatus,
    "Business day for '{location}' on {date} is {actual}, expected {expected}.",
    { location: &str, date: &NaiveDate, actual: &str, expected: &str }
);
define_client_error!(EmptyCart, "Transaction has no billable items.");
define_client_error!(
    InsufficientPayment,
    "Cash received ({received}) is less than the amount due ({due}).",
    { received: f64, due: f64 }
);
define_client_error!(
    DerivedFieldNotEditable,
    "'{field}' is accumulated from transactions and cannot be edited directly.",
    { field: &str }
);

// Settlement.
define_client_error!(
    AlreadySettled,
    "The settlement for {date} has already been saved.",
    { date: &NaiveDate }
);
define_client_error!(
    UnclosedLocations,
    "Cannot settle {date}: locations not yet closed: {locations}.",
    { date: &NaiveDate, locations: &str }
);
define_client_error!(NothingToSettle, "No closed business days on {date}.", { date: &NaiveDate });
define_client_error!(NotSettled, "The settlement for {date} has not been saved yet.", { date: &NaiveDate });

// External services.
define_internal_error!(
    GoogleApiError,
    "Google API request failed: {operation}.",
    { operation: &str }
);
define_client_error!(GoogleNotConnected, "No valid Google credentials are available.");
