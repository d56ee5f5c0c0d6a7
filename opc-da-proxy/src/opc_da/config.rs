//! Server-wide defaults applied when a group or enumeration leaves a
//! setting unspecified.

use super::typedefs::GroupHandle;

/// English (United States).
pub const DEFAULT_LOCALE_ID: u32 = 1033;

/// Batch size used when draining an enumerator.
pub const DEFAULT_ENUM_BATCH_SIZE: u32 = 10;

/// Defaults for new groups.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefaults {
    pub active: bool,
    /// Milliseconds.
    pub update_rate: u32,
    /// Minutes from UTC.
    pub time_bias: i32,
    /// Percent.
    pub deadband: f32,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            active: true,
            update_rate: 1000,
            time_bias: 60,
            deadband: 0.0,
        }
    }
}

/// Settings fixed when a [`crate::Server`] is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptions {
    pub group_defaults: GroupDefaults,
    pub default_locale: u32,
    pub enum_batch_size: u32,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            group_defaults: GroupDefaults::default(),
            default_locale: DEFAULT_LOCALE_ID,
            enum_batch_size: DEFAULT_ENUM_BATCH_SIZE,
        }
    }
}

impl ServerOptions {
    pub fn with_group_defaults(mut self, defaults: GroupDefaults) -> Self {
        self.group_defaults = defaults;
        self
    }

    pub fn with_default_locale(mut self, locale_id: u32) -> Self {
        self.default_locale = locale_id;
        self
    }

    /// A batch size of 0 is raised to 1.
    pub fn with_enum_batch_size(mut self, batch_size: u32) -> Self {
        self.enum_batch_size = batch_size.max(1);
        self
    }
}

/// Per-group overrides for `add_group`. Unset fields fall back to
/// [`ServerOptions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupOptions {
    pub active: Option<bool>,
    pub update_rate: Option<u32>,
    pub time_bias: Option<i32>,
    pub deadband: Option<f32>,
    pub locale_id: Option<u32>,
    pub client_handle: Option<GroupHandle>,
}

impl GroupOptions {
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn update_rate(mut self, millis: u32) -> Self {
        self.update_rate = Some(millis);
        self
    }

    pub fn time_bias(mut self, minutes: i32) -> Self {
        self.time_bias = Some(minutes);
        self
    }

    pub fn deadband(mut self, percent: f32) -> Self {
        self.deadband = Some(percent);
        self
    }

    pub fn locale_id(mut self, locale_id: u32) -> Self {
        self.locale_id = Some(locale_id);
        self
    }

    pub fn client_handle(mut self, handle: GroupHandle) -> Self {
        self.client_handle = Some(handle);
        self
    }
}

/// Every `AddGroup` parameter, decided.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupParams {
    pub active: bool,
    pub update_rate: u32,
    pub time_bias: i32,
    pub deadband: f32,
    pub locale_id: u32,
    pub client_handle: GroupHandle,
}

impl ServerOptions {
    pub(crate) fn resolve(
        &self,
        options: &GroupOptions,
        next_client_handle: impl FnOnce() -> GroupHandle,
    ) -> GroupParams {
        let defaults = &self.group_defaults;
        GroupParams {
            active: options.active.unwrap_or(defaults.active),
            update_rate: options.update_rate.unwrap_or(defaults.update_rate),
            time_bias: options.time_bias.unwrap_or(defaults.time_bias),
            deadband: options.deadband.unwrap_or(defaults.deadband),
            locale_id: options.locale_id.unwrap_or(self.default_locale),
            client_handle: options.client_handle.unwrap_or_else(next_client_handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ServerOptions::default();
        assert!(options.group_defaults.active);
        assert_eq!(options.group_defaults.update_rate, 1000);
        assert_eq!(options.group_defaults.time_bias, 60);
        assert!(options.group_defaults.deadband.abs() < f32::EPSILON);
        assert_eq!(options.default_locale, 1033);
        assert_eq!(options.enum_batch_size, 10);
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let options = ServerOptions::default().with_default_locale(1031);
        let resolved = options.resolve(
            &GroupOptions::default().update_rate(250).active(false),
            || GroupHandle(7),
        );
        assert_eq!(resolved.update_rate, 250);
        assert!(!resolved.active);
        assert_eq!(resolved.time_bias, 60);
        assert_eq!(resolved.locale_id, 1031);
        assert_eq!(resolved.client_handle, GroupHandle(7));
    }

    #[test]
    fn test_explicit_client_handle_skips_allocation() {
        let resolved = ServerOptions::default().resolve(
            &GroupOptions::default().client_handle(GroupHandle(3)),
            || panic!("allocator must not run"),
        );
        assert_eq!(resolved.client_handle, GroupHandle(3));
    }

    #[test]
    fn test_zero_batch_size_is_raised() {
        assert_eq!(
            ServerOptions::default().with_enum_batch_size(0).enum_batch_size,
            1
        );
    }
}
