//! Closed registry of capability identifiers known to this client build.
//!
//! The server owns the list; this mirror exists so screens reference named
//! constants instead of string literals, and so unknown identifiers arriving
//! from the server can be reported.

use crate::Capability;

macro_rules! capabilities {
    ($( $resource:ident => [$( $action:ident ),+ $(,)?] ),+ $(,)?) => {
        $(
            #[allow(non_snake_case)]
            pub mod $resource {
                use crate::Capability;
                $(
                    pub const $action: Capability = Capability::from_static(
                        concat!(stringify!($resource), ".", stringify!($action))
                    );
                )+
            }
        )+

        /// Every registered capability, in declaration order.
        pub const ALL: &[Capability] = &[
            $( $( $resource::$action, )+ )+
        ];
    };
}

capabilities! {
    CUSTOMER => [VIEW, CREATE, UPDATE, DELETE],
    CONTRACT => [VIEW, CREATE, UPDATE, DELETE],
    DOMAIN_SERVICE => [VIEW, CREATE, UPDATE, DELETE],
    HOSTING_SERVICE => [VIEW, CREATE, UPDATE, DELETE],
    SSL_SERVICE => [VIEW, CREATE, UPDATE, DELETE],
    EMAIL_SERVICE => [VIEW, CREATE, UPDATE, DELETE],
    WEBSITE_SERVICE => [VIEW, CREATE, UPDATE, DELETE],
    PLAN => [VIEW, CREATE, UPDATE, DELETE],
    SUPPLIER => [VIEW, CREATE, UPDATE, DELETE],
    USER => [VIEW, CREATE, UPDATE, DELETE],
    IP_WHITELIST => [VIEW, CREATE, DELETE],
    ACTION_LOG => [VIEW],
    DASHBOARD => [VIEW],
}

pub fn is_registered(capability: &Capability) -> bool {
    ALL.iter().any(|known| known == capability)
}

/// Human-readable description, for audit and debugging output.
pub fn describe(capability: &Capability) -> Option<String> {
    if !is_registered(capability) {
        return None;
    }

    let (resource, action) = capability.as_str().split_once('.')?;
    let action_desc = match action {
        "VIEW" => "View/list",
        "CREATE" => "Create new",
        "UPDATE" => "Edit existing",
        "DELETE" => "Delete",
        other => other,
    };

    Some(format!(
        "{} {} records",
        action_desc,
        resource.to_lowercase().replace('_', " ")
    ))
}
