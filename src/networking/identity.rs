// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Stable per-peer identity, stored as a single text file under the
//! metadata directory.

use std::fs;
use std::io;
use std::path::Path;

use uuid::Uuid;

const NAME_FILE: &str = "name";

/// Load this peer's UUID from `meta_dir/name`, or generate and persist a
/// fresh one. A missing or unparsable file is treated as absent, not as an
/// I/O error — it is simply regenerated.
pub fn load_or_create(meta_dir: &Path) -> io::Result<String> {
    fs::create_dir_all(meta_dir)?;
    let path = meta_dir.join(NAME_FILE);

    if let Ok(contents) = fs::read_to_string(&path) {
        let candidate = contents.trim();
        if Uuid::parse_str(candidate).is_ok() {
            return Ok(candidate.to_string());
        }
    }

    let name = Uuid::new_v4().to_string();

    let tmp_path = meta_dir.join(format!("{NAME_FILE}.new"));
    {
        let mut f = fs::File::create(&tmp_path)?;
        use io::Write;
        writeln!(f, "{name}")?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, &path)?;

    Ok(name)
}
