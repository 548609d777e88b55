//! Catalog of protected resources
//!
//! A resource names one operation of the HTTP surface as `<route>.<method>`,
//! e.g. `image.get` or `accessrules.post`. Access rules store resources as
//! plain strings so that deployments can grant identifiers outside the
//! catalog; the catalog is what the request gate maps routes onto.

use crate::error::AccessControlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! resource_catalog {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A resource identifier known to the image server
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Resource {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl Resource {
            /// Every catalog entry, in declaration order
            const CATALOG: &'static [Resource] = &[$(Resource::$variant),+];

            /// Dotted identifier stored in access rules
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Resource::$variant => $name,)+
                }
            }
        }

        impl FromStr for Resource {
            type Err = AccessControlError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Resource::$variant),)+
                    _ => Err(AccessControlError::UnknownResource(s.to_string())),
                }
            }
        }
    };
}

resource_catalog! {
    GroupsGet => "groups.get",
    GroupsHead => "groups.head",
    GroupsOptions => "groups.options",

    GroupGet => "group.get",
    GroupHead => "group.head",
    GroupPut => "group.put",
    GroupDelete => "group.delete",
    GroupOptions => "group.options",

    KeysPut => "keys.put",
    KeysHead => "keys.head",
    KeysDelete => "keys.delete",
    KeysOptions => "keys.options",

    AccessRuleGet => "accessrule.get",
    AccessRuleHead => "accessrule.head",
    AccessRuleDelete => "accessrule.delete",
    AccessRuleOptions => "accessrule.options",

    AccessRulesGet => "accessrules.get",
    AccessRulesHead => "accessrules.head",
    AccessRulesPost => "accessrules.post",
    AccessRulesOptions => "accessrules.options",

    UserGet => "user.get",
    UserHead => "user.head",
    UserOptions => "user.options",

    ImageGet => "image.get",
    ImageHead => "image.head",
    ImageDelete => "image.delete",
    ImageOptions => "image.options",

    ImagesGet => "images.get",
    ImagesHead => "images.head",
    ImagesPost => "images.post",
    ImagesOptions => "images.options",

    GlobalImagesGet => "globalimages.get",
    GlobalImagesHead => "globalimages.head",
    GlobalImagesOptions => "globalimages.options",

    MetadataGet => "metadata.get",
    MetadataHead => "metadata.head",
    MetadataPut => "metadata.put",
    MetadataPost => "metadata.post",
    MetadataDelete => "metadata.delete",
    MetadataOptions => "metadata.options",

    ShortUrlGet => "shorturl.get",
    ShortUrlHead => "shorturl.head",
    ShortUrlDelete => "shorturl.delete",
    ShortUrlOptions => "shorturl.options",

    ShortUrlsPost => "shorturls.post",
    ShortUrlsDelete => "shorturls.delete",
    ShortUrlsOptions => "shorturls.options",
}

const READ_ONLY: &[Resource] = &[
    Resource::UserGet,
    Resource::UserHead,
    Resource::UserOptions,
    Resource::ImageGet,
    Resource::ImageHead,
    Resource::ImageOptions,
    Resource::ImagesGet,
    Resource::ImagesHead,
    Resource::ImagesOptions,
    Resource::MetadataGet,
    Resource::MetadataHead,
    Resource::MetadataOptions,
    Resource::ShortUrlGet,
    Resource::ShortUrlHead,
    Resource::ShortUrlOptions,
    Resource::GlobalImagesGet,
    Resource::GlobalImagesHead,
    Resource::GlobalImagesOptions,
    Resource::ShortUrlsOptions,
];

const WRITE_EXTRAS: &[Resource] = &[
    Resource::ImageDelete,
    Resource::ImagesPost,
    Resource::MetadataPost,
    Resource::MetadataDelete,
    Resource::MetadataPut,
    Resource::ShortUrlDelete,
    Resource::ShortUrlsPost,
    Resource::ShortUrlsDelete,
];

const ADMIN_EXTRAS: &[Resource] = &[
    Resource::KeysPut,
    Resource::KeysHead,
    Resource::KeysDelete,
    Resource::KeysOptions,
    Resource::AccessRuleGet,
    Resource::AccessRuleHead,
    Resource::AccessRuleDelete,
    Resource::AccessRuleOptions,
    Resource::AccessRulesGet,
    Resource::AccessRulesHead,
    Resource::AccessRulesPost,
    Resource::AccessRulesOptions,
    Resource::GroupsGet,
    Resource::GroupsHead,
    Resource::GroupsOptions,
    Resource::GroupGet,
    Resource::GroupHead,
    Resource::GroupPut,
    Resource::GroupDelete,
    Resource::GroupOptions,
];

impl Resource {
    /// Resources a read-only public key is usually granted
    pub fn read_only() -> Vec<Resource> {
        READ_ONLY.to_vec()
    }

    /// Read-only resources plus image, metadata and short URL writes
    pub fn read_write() -> Vec<Resource> {
        READ_ONLY.iter().chain(WRITE_EXTRAS).copied().collect()
    }

    /// Every resource, including key, access rule and group administration
    pub fn all() -> Vec<Resource> {
        READ_ONLY
            .iter()
            .chain(WRITE_EXTRAS)
            .chain(ADMIN_EXTRAS)
            .copied()
            .collect()
    }

    /// Iterate the catalog in declaration order
    pub fn iter() -> impl Iterator<Item = Resource> {
        Self::CATALOG.iter().copied()
    }

    /// Map a route name and HTTP method onto a catalog resource
    ///
    /// `("image", "GET")` becomes [`Resource::ImageGet`]. Returns `None` when
    /// the combination is not part of the catalog.
    pub fn from_route(route: &str, method: &str) -> Option<Resource> {
        let name = format!("{}.{}", route.to_lowercase(), method.to_lowercase());
        name.parse().ok()
    }

    /// Whether a free-form resource string names a catalog entry
    pub fn is_known(resource: &str) -> bool {
        resource.parse::<Resource>().is_ok()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Resource {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<Resource> for String {
    fn from(resource: Resource) -> Self {
        resource.as_str().to_string()
    }
}
