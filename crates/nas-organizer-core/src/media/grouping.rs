use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::paths::{extension_of, file_name, parent_dir, stem_of};

pub const DEFAULT_VIDEO_EXTS: &[&str] = &["mkv", "mp4", "avi", "mov"];

pub const DEFAULT_SIDECAR_EXTS: &[&str] = &[
    "nfo", "jpg", "jpeg", "png", "webp", "srt", "ass", "ssa", "sub", "idx",
];

/// Kodi/Jellyfin folder-level artwork. Only attached when a directory holds
/// exactly one video.
pub const FOLDER_LEVEL_SIDECAR_NAMES: &[&str] = &[
    "poster.jpg",
    "poster.jpeg",
    "poster.png",
    "poster.webp",
    "fanart.jpg",
    "fanart.jpeg",
    "fanart.png",
    "backdrop.jpg",
    "backdrop.jpeg",
    "backdrop.png",
    "landscape.jpg",
    "landscape.jpeg",
    "landscape.png",
    "banner.jpg",
    "banner.jpeg",
    "banner.png",
    "logo.png",
    "logo.webp",
    "clearlogo.png",
    "clearlogo.webp",
    "clearart.png",
    "clearart.webp",
    "disc.png",
    "disc.webp",
    "thumb.jpg",
    "thumb.jpeg",
    "thumb.png",
    "folder.jpg",
    "folder.jpeg",
    "folder.png",
];

pub const FOLDER_LEVEL_NFO_NAMES: &[&str] = &["movie.nfo"];

/// A remote file, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaFile {
    path: String,
}

impl MediaFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dir(&self) -> String {
        parent_dir(&self.path)
    }

    pub fn name(&self) -> &str {
        file_name(&self.path)
    }

    pub fn extension(&self) -> String {
        extension_of(self.name())
    }

    pub fn stem(&self) -> &str {
        stem_of(self.name())
    }
}

/// One video plus its sidecars, all in the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGroup {
    pub directory: String,
    pub base_stem: String,
    pub video: Option<MediaFile>,
    pub sidecars: Vec<MediaFile>,
    pub nfo: Option<MediaFile>,
}

impl MediaGroup {
    pub fn new(directory: impl Into<String>, base_stem: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_stem: base_stem.into(),
            video: None,
            sidecars: Vec::new(),
            nfo: None,
        }
    }

    /// Attach a sidecar unless it is already present.
    pub fn add_sidecar(&mut self, file: MediaFile) {
        if !self.sidecars.iter().any(|s| s.path() == file.path()) {
            self.sidecars.push(file);
        }
    }

    /// Video first, then sidecars; unique by path.
    pub fn all_files(&self) -> Vec<&MediaFile> {
        let mut seen = HashSet::new();
        self.video
            .iter()
            .chain(self.sidecars.iter())
            .filter(|f| seen.insert(f.path()))
            .collect()
    }

    pub fn display_name(&self) -> &str {
        match &self.video {
            Some(video) => video.name(),
            None => &self.base_stem,
        }
    }
}

/// Extension sets used by [`group_media_files`]. Entries are compared
/// lowercase without a leading dot.
#[derive(Debug, Clone)]
pub struct GroupingRules {
    pub video_exts: HashSet<String>,
    pub sidecar_exts: HashSet<String>,
}

impl GroupingRules {
    pub fn new<S: AsRef<str>>(video_exts: &[S], sidecar_exts: &[S]) -> Self {
        Self {
            video_exts: normalize_exts(video_exts),
            sidecar_exts: normalize_exts(sidecar_exts),
        }
    }
}

impl Default for GroupingRules {
    fn default() -> Self {
        Self::new(DEFAULT_VIDEO_EXTS, DEFAULT_SIDECAR_EXTS)
    }
}

fn normalize_exts<S: AsRef<str>>(exts: &[S]) -> HashSet<String> {
    exts.iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Group a flat path list into media groups, one per video file.
///
/// Grouping never crosses directories. A sidecar matches a video with stem `S`
/// when its name is `S.nfo` in any suffix case (which also becomes the
/// group's NFO), or starts
/// with `S.` or `S-`. Folder-level artwork and `movie.nfo` are attached only
/// when the directory holds exactly one video. Files matching nothing are left
/// out.
pub fn group_media_files<S: AsRef<str>>(paths: &[S], rules: &GroupingRules) -> Vec<MediaGroup> {
    let mut by_dir: BTreeMap<String, Vec<MediaFile>> = BTreeMap::new();
    for path in paths {
        let file = MediaFile::new(path.as_ref());
        by_dir.entry(file.dir()).or_default().push(file);
    }

    let mut groups = Vec::new();

    for (dir, files) in &by_dir {
        let mut videos: Vec<&MediaFile> = files
            .iter()
            .filter(|f| rules.video_exts.contains(&f.extension()))
            .collect();
        videos.sort_by_key(|f| f.name().to_lowercase());
        let single_video = videos.len() == 1;

        for video in &videos {
            let stem = video.stem();
            let mut group = MediaGroup::new(dir.clone(), stem);
            group.video = Some((*video).clone());

            let dot_prefix = format!("{}.", stem);
            let dash_prefix = format!("{}-", stem);

            for file in files {
                if file.path() == video.path() || !rules.sidecar_exts.contains(&file.extension()) {
                    continue;
                }
                let name = file.name();
                if file.extension() == "nfo" && file.stem() == stem {
                    group.nfo = Some(file.clone());
                    group.add_sidecar(file.clone());
                } else if name.starts_with(&dot_prefix) || name.starts_with(&dash_prefix) {
                    group.add_sidecar(file.clone());
                }
            }

            if single_video {
                for file in files {
                    if file.path() == video.path() || !rules.sidecar_exts.contains(&file.extension()) {
                        continue;
                    }
                    let lower = file.name().to_lowercase();
                    if FOLDER_LEVEL_NFO_NAMES.contains(&lower.as_str()) {
                        if group.nfo.is_none() {
                            group.nfo = Some(file.clone());
                        }
                        group.add_sidecar(file.clone());
                    } else if FOLDER_LEVEL_SIDECAR_NAMES.contains(&lower.as_str()) {
                        group.add_sidecar(file.clone());
                    }
                }
            }

            groups.push(group);
        }
    }

    debug!("Grouped {} paths into {} media groups", paths.len(), groups.len());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[MediaFile]) -> Vec<&str> {
        files.iter().map(|f| f.name()).collect()
    }

    #[test]
    fn test_single_video_collects_all_sidecars() {
        let paths = [
            "/m/Movie/Movie.mkv",
            "/m/Movie/Movie.en.srt",
            "/m/Movie/Movie.nfo",
            "/m/Movie/poster.jpg",
        ];
        let groups = group_media_files(&paths, &GroupingRules::default());
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.base_stem, "Movie");
        assert_eq!(g.sidecars.len(), 3);
        let sidecar_names = names(&g.sidecars);
        assert!(sidecar_names.contains(&"Movie.en.srt"));
        assert!(sidecar_names.contains(&"Movie.nfo"));
        assert!(sidecar_names.contains(&"poster.jpg"));
        assert_eq!(g.nfo.as_ref().map(|f| f.path()), Some("/m/Movie/Movie.nfo"));
    }

    #[test]
    fn test_folder_level_names_ignored_with_multiple_videos() {
        let paths = ["/m/A.mkv", "/m/B.mkv", "/m/poster.jpg"];
        let groups = group_media_files(&paths, &GroupingRules::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].base_stem, "A");
        assert_eq!(groups[1].base_stem, "B");
        for g in &groups {
            assert!(g.sidecars.is_empty(), "poster.jpg must not be attached to {}", g.base_stem);
        }
    }

    #[test]
    fn test_folder_level_movie_nfo_becomes_nfo_when_missing() {
        let paths = ["/m/X/Film.mp4", "/m/X/movie.nfo", "/m/X/Film-fanart.jpg"];
        let groups = group_media_files(&paths, &GroupingRules::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].nfo.as_ref().map(|f| f.name()), Some("movie.nfo"));
        assert_eq!(groups[0].sidecars.len(), 2);
    }

    #[test]
    fn test_grouping_never_crosses_directories() {
        let paths = ["/m/a/Movie.mkv", "/m/b/Movie.srt", "/m/b/Other.txt"];
        let groups = group_media_files(&paths, &GroupingRules::default());
        assert_eq!(groups.len(), 1);
        assert!(groups[0].sidecars.is_empty());
    }

    #[test]
    fn test_unrecognized_extensions_are_orphans() {
        let paths = ["/m/Movie.mkv", "/m/Movie.txt", "/m/Movie.en.srt"];
        let groups = group_media_files(&paths, &GroupingRules::default());
        assert_eq!(names(&groups[0].sidecars), vec!["Movie.en.srt"]);
    }

    #[test]
    fn test_custom_extension_sets() {
        let rules = GroupingRules::new(&[".TS"], &["SRT"]);
        let paths = ["/m/Show.ts", "/m/Show.srt", "/m/Show.nfo"];
        let groups = group_media_files(&paths, &rules);
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0].sidecars), vec!["Show.srt"]);
        assert!(groups[0].nfo.is_none());
    }

    #[test]
    fn test_all_files_is_unique_and_video_first() {
        let mut g = MediaGroup::new("/m", "Movie");
        g.video = Some(MediaFile::new("/m/Movie.mkv"));
        g.add_sidecar(MediaFile::new("/m/Movie.srt"));
        g.add_sidecar(MediaFile::new("/m/Movie.srt"));
        let all: Vec<&str> = g.all_files().iter().map(|f| f.path()).collect();
        assert_eq!(all, vec!["/m/Movie.mkv", "/m/Movie.srt"]);
    }

    #[test]
    fn test_upper_case_nfo_suffix_is_the_group_nfo() {
        let paths = ["/m/A/Movie.mkv", "/m/A/Movie.NFO", "/m/A/Other.mkv", "/m/A/movie.nfo"];
        let groups = group_media_files(&paths, &GroupingRules::default());
        let movie = groups.iter().find(|g| g.base_stem == "Movie").unwrap();
        assert_eq!(movie.nfo.as_ref().map(|f| f.name()), Some("Movie.NFO"));
        assert_eq!(names(&movie.sidecars), vec!["Movie.NFO"]);
    }
}
