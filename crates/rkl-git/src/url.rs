//! Git remote locators.

use std::{
	fmt,
	hash::{Hash, Hasher},
	str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::GitError;

/// A parsed git remote.
///
/// Accepts `scheme://[user@]host[:port]/path`, scp-like `[user@]host:path`
/// and absolute local paths. The original string is what gets handed to git;
/// equality and hashing go through [`GitUrl::normalized_repo_key`] so that
/// spellings of the same repository share one mirror.
#[derive(Debug, Clone)]
pub struct GitUrl {
	raw: String,
	scheme: String,
	user: Option<String>,
	host: String,
	port: Option<u16>,
	path: String,
}

impl GitUrl {
	pub fn parse(raw: &str) -> Result<Self, GitError> {
		let invalid = |reason: &str| GitError::InvalidUrl {
			url: raw.to_owned(),
			reason: reason.to_owned(),
		};

		let s = raw.trim();
		if s.is_empty() {
			return Err(invalid("url is empty"));
		}

		if let Some((scheme, rest)) = s.split_once("://") {
			if scheme.is_empty()
				|| !scheme
					.chars()
					.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
			{
				return Err(invalid("invalid scheme"));
			}
			let scheme = scheme.to_ascii_lowercase();
			let (authority, path) = match rest.find('/') {
				Some(i) => rest.split_at(i),
				None => (rest, ""),
			};
			let (user, host_port) = match authority.rsplit_once('@') {
				Some((user, host)) => (Some(user.to_owned()), host),
				None => (None, authority),
			};
			let (host, port) = split_port(host_port).ok_or_else(|| invalid("invalid port"))?;
			if host.is_empty() && scheme != "file" {
				return Err(invalid("missing host"));
			}
			return Ok(Self {
				raw: s.to_owned(),
				scheme,
				user,
				host: host.to_owned(),
				port,
				path: path.to_owned(),
			});
		}

		if is_absolute_local_path(s) {
			return Ok(Self {
				raw: s.to_owned(),
				scheme: "file".to_owned(),
				user: None,
				host: String::new(),
				port: None,
				path: s.to_owned(),
			});
		}

		// scp-like syntax, `git@github.com:org/repo.git`
		if let Some((left, path)) = s.split_once(':') {
			if !left.contains('/') && !path.is_empty() {
				let (user, host) = match left.rsplit_once('@') {
					Some((user, host)) => (Some(user.to_owned()), host),
					None => (None, left),
				};
				if host.is_empty() {
					return Err(invalid("missing host"));
				}
				return Ok(Self {
					raw: s.to_owned(),
					scheme: "ssh".to_owned(),
					user,
					host: host.to_owned(),
					port: None,
					path: path.to_owned(),
				});
			}
		}

		Err(invalid("not a url, scp-like address or absolute path"))
	}

	/// The url as written, which is what git is given.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	pub fn user(&self) -> Option<&str> {
		self.user.as_deref()
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> Option<u16> {
		self.port
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	fn host_with_port(&self) -> String {
		match self.port {
			Some(port) => format!("{}:{}", self.host, port),
			None => self.host.clone(),
		}
	}

	fn normalized_path(&self) -> &str {
		let path = self.path.trim_matches('/');
		path.strip_suffix(".git").unwrap_or(path).trim_end_matches('/')
	}

	/// Lowercased `host[:port]/path` with surrounding slashes and a trailing
	/// `.git` removed.
	pub fn normalized_repo_key(&self) -> String {
		format!("{}/{}", self.host_with_port(), self.normalized_path()).to_lowercase()
	}

	/// Directory name shared by a repository's mirror and its exports:
	/// `<basename>-<first 16 hex chars of sha256(host:path)>`.
	pub fn cache_dir_name(&self) -> String {
		let path = self.normalized_path();
		let base = path
			.rsplit(['/', '\\'])
			.next()
			.filter(|b| !b.is_empty())
			.unwrap_or("repo");
		let base: String = base
			.chars()
			.map(|c| {
				if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
					c
				} else {
					'_'
				}
			})
			.collect();

		let mut hasher = Sha256::new();
		hasher.update(format!("{}:{}", self.host_with_port(), path).to_lowercase());
		let hash = format!("{:x}", hasher.finalize());

		format!("{}-{}", base, &hash[..16])
	}
}

fn split_port(host_port: &str) -> Option<(&str, Option<u16>)> {
	// bracketed IPv6 literal
	if let Some(rest) = host_port.strip_prefix('[') {
		let (host, after) = rest.split_once(']')?;
		return match after.strip_prefix(':') {
			Some(port) => Some((host, Some(port.parse().ok()?))),
			None if after.is_empty() => Some((host, None)),
			None => None,
		};
	}
	match host_port.rsplit_once(':') {
		Some((host, "")) => Some((host, None)),
		Some((host, port)) => Some((host, Some(port.parse().ok()?))),
		None => Some((host_port, None)),
	}
}

fn is_absolute_local_path(s: &str) -> bool {
	if s.starts_with('/') {
		return true;
	}
	let bytes = s.as_bytes();
	bytes.len() >= 3
		&& bytes[0].is_ascii_alphabetic()
		&& bytes[1] == b':'
		&& matches!(bytes[2], b'/' | b'\\')
}

impl PartialEq for GitUrl {
	fn eq(&self, other: &Self) -> bool {
		self.normalized_repo_key() == other.normalized_repo_key()
	}
}

impl Eq for GitUrl {}

impl Hash for GitUrl {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.normalized_repo_key().hash(state);
	}
}

impl fmt::Display for GitUrl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl FromStr for GitUrl {
	type Err = GitError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl Serialize for GitUrl {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.raw)
	}
}

impl<'de> Deserialize<'de> for GitUrl {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		Self::parse(&raw).map_err(serde::de::Error::custom)
	}
}
