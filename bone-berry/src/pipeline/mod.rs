//! 被试级别的左右拆分流水线.
//!
//! 对一个被试目录依次执行:
//!
//! 1. 修剪: 删除文件名不含任何骨骼关键字的文件;
//! 2. 加载股骨参照物, 空的股骨文件被删除;
//! 3. 依次处理髌骨、胫骨、腓骨: 拆分出最大的两个连通域, 判定左右侧,
//!    保存为 `<bone>_<side>.nii.gz`, 至少保存一侧后删除原始文件.
//!
//! 单个骨骼类别的失败只影响该类别, 不会中止整个被试.
//! 已经处理过的目录再次运行不会产生任何文件变化.

mod report;

pub use report::{BoneOutcome, RunSummary, SubjectReport};

use std::path::{Path, PathBuf};

use crate::dataset;
use crate::error::PipelineError;
use crate::journal::{Event, Journal};
use crate::post_proc::{assign, split_two_largest, ReferenceSet};
use crate::{BoneClass, BoneMask, NiftiHeaderAttr, Side, VolumeStore};

/// 被试流水线. 文件访问与日志都由调用者注入.
pub struct SubjectPipeline<'a> {
    store: &'a dyn VolumeStore,
    journal: &'a mut dyn Journal,
    subject: String,
}

impl<'a> SubjectPipeline<'a> {
    /// 创建流水线.
    pub fn new(store: &'a dyn VolumeStore, journal: &'a mut dyn Journal) -> Self {
        Self {
            store,
            journal,
            subject: String::new(),
        }
    }

    #[inline]
    fn note(&mut self, event: Event) {
        self.journal.record(&self.subject, event);
    }

    /// 处理被试目录 `dir`.
    ///
    /// 只有目录本身无法列举时才返回错误; 其余问题都记录在日志和返回的报告中.
    pub fn process(&mut self, dir: &Path) -> Result<SubjectReport, PipelineError> {
        self.subject = dataset::subject_name(dir);
        let mut report = SubjectReport::new(&self.subject, dir);

        report.pruned = match self.prune(dir) {
            Ok(p) => p,
            Err(e) => {
                self.note(Event::SubjectFailed(e.to_string()));
                return Err(e);
            }
        };

        let references = ReferenceSet::new(
            self.load_reference(dir, Side::Left),
            self.load_reference(dir, Side::Right),
        );
        report.references = references.sides();

        for bone in BoneClass::TARGETS {
            let outcome = self.process_bone(dir, bone, &references);
            report.bones.push((bone, outcome));
        }
        Ok(report)
    }

    /// 删除文件名不含骨骼关键字的普通文件, 返回被删除的文件.
    fn prune(&mut self, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let files = dataset::sorted_files(dir).map_err(|source| PipelineError::Io {
            path: dir.to_owned(),
            source,
        })?;

        let mut pruned = Vec::new();
        for file in files {
            let recognized = file
                .file_name()
                .is_some_and(|n| dataset::is_recognized(&n.to_string_lossy()));
            if recognized {
                continue;
            }
            match self.store.delete(&file) {
                Ok(()) => {
                    self.note(Event::Pruned(file.clone()));
                    pruned.push(file);
                }
                Err(e) => self.note(Event::DeleteFailed {
                    file,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(pruned)
    }

    /// 删除空掩码文件. 返回是否删除成功.
    fn remove_empty(&mut self, path: &Path) -> bool {
        match self.store.delete(path) {
            Ok(()) => {
                self.note(Event::EmptyDeleted(path.to_owned()));
                true
            }
            Err(e) => {
                self.note(Event::DeleteFailed {
                    file: path.to_owned(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// 加载某一侧的股骨参照物. 缺失、为空或无法读取时返回 `None`.
    fn load_reference(&mut self, dir: &Path, side: Side) -> Option<BoneMask> {
        let path = dir.join(BoneClass::femur(side).file_name());
        match self.store.load(&path) {
            Ok(mask) if mask.count_foreground() == 0 => {
                self.remove_empty(&path);
                None
            }
            Ok(mask) => {
                self.note(Event::ReferenceAvailable(side));
                Some(mask)
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                self.note(Event::ReferenceUnreadable {
                    file: path,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn process_bone(
        &mut self,
        dir: &Path,
        bone: BoneClass,
        references: &ReferenceSet,
    ) -> BoneOutcome {
        let path = dir.join(bone.file_name());
        let mask = match self.store.load(&path) {
            Ok(m) => m,
            Err(e) if e.is_not_found() => {
                self.note(Event::MissingInput(path));
                return BoneOutcome::MissingInput;
            }
            Err(e) => {
                let reason = e.to_string();
                self.note(Event::Malformed {
                    file: path,
                    reason: reason.clone(),
                });
                return BoneOutcome::FormatError { reason };
            }
        };

        if mask.count_foreground() == 0 {
            self.remove_empty(&path);
            return BoneOutcome::Empty;
        }

        // 没有参照物时无需拆分.
        let components = if references.is_empty() {
            (None, None)
        } else {
            if !mask.is_isotropic() {
                self.note(Event::Anisotropic {
                    bone,
                    pix_dim: mask.pix_dim(),
                });
            }
            let components = split_two_largest(&mask);
            let count = components.0.is_some() as usize + components.1.is_some() as usize;
            self.note(Event::Components { bone, count });
            components
        };

        let (confidence, sides) = match assign(references, components).into_sides() {
            Ok(v) => v,
            Err(reason) => {
                self.note(Event::Unresolved { bone, reason });
                return BoneOutcome::Unresolved { reason };
            }
        };

        let mut saved = Vec::with_capacity(2);
        for (side, component) in sides {
            self.note(Event::Assigned {
                bone,
                side,
                confidence,
            });
            let target = dir.join(bone.sided_file_name(side));
            match self.store.save(&component, &target) {
                Ok(()) => {
                    self.note(Event::Saved(target));
                    saved.push(side);
                }
                Err(e) => self.note(Event::SaveFailed {
                    file: target,
                    reason: e.to_string(),
                }),
            }
        }
        if saved.is_empty() {
            return BoneOutcome::SaveFailed;
        }

        let original_removed = match self.store.delete(&path) {
            Ok(()) => {
                self.note(Event::OriginalDeleted(path));
                true
            }
            Err(e) => {
                self.note(Event::DeleteFailed {
                    file: path,
                    reason: e.to_string(),
                });
                false
            }
        };
        BoneOutcome::Resolved {
            saved,
            confidence,
            original_removed,
        }
    }
}

/// 依次处理根目录 `root` 下的每个被试目录 (按目录名排序).
///
/// 单个被试中止不影响后续被试. 只有 `root` 本身无法列举时才返回错误.
pub fn run_root(
    root: &Path,
    store: &dyn VolumeStore,
    journal: &mut dyn Journal,
) -> Result<RunSummary, PipelineError> {
    let loader = dataset::subject_loader(root).map_err(|source| PipelineError::Io {
        path: root.to_owned(),
        source,
    })?;
    log::info!("{} subjects found in {}", loader.len(), root.display());

    let mut pipeline = SubjectPipeline::new(store, journal);
    let mut summary = RunSummary::default();
    for (name, dir) in loader {
        match pipeline.process(&dir) {
            Ok(report) => summary.subjects.push(report),
            Err(e) => summary.failed.push((name, e.to_string())),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{run_root, BoneOutcome, SubjectPipeline};
    use crate::error::VolumeError;
    use crate::journal::{Event, Level, MemoryJournal};
    use crate::post_proc::{Confidence, UnresolvedReason};
    use crate::{BoneClass, BoneMask, Idx3d, NiftiHeaderAttr, NiftiStore, Side, VolumeStore};
    use ndarray::Array3;
    use nifti::NiftiType;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    const SHAPE: Idx3d = (20, 20, 100);

    /// 在每个 `centers` 处各放一个 3x3x3 的立方体.
    fn cubes(centers: &[Idx3d]) -> BoneMask {
        let mut data = Array3::<u8>::zeros(SHAPE);
        for &(z, h, w) in centers {
            for dz in 0..3 {
                for dh in 0..3 {
                    for dw in 0..3 {
                        data[(z + dz - 1, h + dh - 1, w + dw - 1)] = 1;
                    }
                }
            }
        }
        BoneMask::fake(data, [1.0, 1.0, 1.0])
    }

    fn put(dir: &Path, name: &str, mask: &BoneMask) {
        NiftiStore.save(mask, &dir.join(name)).unwrap();
    }

    /// 目录下所有普通文件的 (文件名, 内容).
    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_file())
            .map(|e| {
                (
                    e.file_name().into_string().unwrap(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    /// 目录下所有条目 (含子目录) 的名字, 按字典序排列.
    fn names(dir: &Path) -> Vec<String> {
        let mut ans: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        ans.sort();
        ans
    }

    fn w_of(dir: &Path, name: &str) -> f64 {
        NiftiStore.load(&dir.join(name)).unwrap().centroid().unwrap().2
    }

    /// 两侧股骨 + 两块胫骨.
    fn tibia_case(dir: &Path) {
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        put(dir, "femur_right.nii.gz", &cubes(&[(10, 10, 90)]));
        put(dir, "tibia.nii.gz", &cubes(&[(10, 10, 12), (10, 10, 88)]));
    }

    #[test]
    fn test_two_components_two_references() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        tibia_case(dir);

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(
            names(dir),
            vec![
                "femur_left.nii.gz",
                "femur_right.nii.gz",
                "tibia_left.nii.gz",
                "tibia_right.nii.gz"
            ]
        );
        assert!((w_of(dir, "tibia_left.nii.gz") - 12.0).abs() < 1e-9);
        assert!((w_of(dir, "tibia_right.nii.gz") - 88.0).abs() < 1e-9);

        assert_eq!(report.references, vec![Side::Left, Side::Right]);
        assert_eq!(
            report.outcome(BoneClass::Tibia),
            Some(&BoneOutcome::Resolved {
                saved: vec![Side::Left, Side::Right],
                confidence: Confidence::Geometric,
                original_removed: true,
            })
        );
        // 缺失的髌骨和腓骨各记一条错误.
        assert_eq!(report.outcome(BoneClass::Patella), Some(&BoneOutcome::MissingInput));
        assert_eq!(journal.count(Level::Error), 2);
        assert!(journal
            .events()
            .any(|e| matches!(e, Event::OriginalDeleted(p) if p.ends_with("tibia.nii.gz"))));
    }

    #[test]
    fn test_outputs_keep_input_datatype() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        let as_float = |mut m: BoneMask| {
            m.header_mut().datatype = NiftiType::Float32 as i16;
            m.header_mut().bitpix = 32;
            m
        };
        put(dir, "femur_left.nii.gz", &as_float(cubes(&[(10, 10, 10)])));
        put(dir, "femur_right.nii.gz", &as_float(cubes(&[(10, 10, 90)])));
        put(dir, "tibia.nii.gz", &as_float(cubes(&[(10, 10, 12), (10, 10, 88)])));

        let mut journal = MemoryJournal::new();
        SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        for name in ["tibia_left.nii.gz", "tibia_right.nii.gz"] {
            let out = NiftiStore.load(&dir.join(name)).unwrap();
            assert_eq!(out.header().datatype, NiftiType::Float32 as i16);
            assert_eq!(out.count_foreground(), 27);
        }
        assert!((w_of(dir, "tibia_left.nii.gz") - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_rerun_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        tibia_case(dir);

        let mut journal = MemoryJournal::new();
        SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();
        let before = snapshot(dir);

        journal.clear();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();
        assert_eq!(snapshot(dir), before);
        assert!(report.pruned.is_empty());
        assert!(report
            .bones
            .iter()
            .all(|(_, o)| *o == BoneOutcome::MissingInput));
        assert!(!journal
            .events()
            .any(|e| matches!(e, Event::Saved(_) | Event::OriginalDeleted(_))));
    }

    #[test]
    fn test_empty_bone_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        put(dir, "fibula.nii.gz", &cubes(&[]));

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(report.outcome(BoneClass::Fibula), Some(&BoneOutcome::Empty));
        assert_eq!(names(dir), vec!["femur_left.nii.gz"]);
        let deleted: Vec<_> = journal
            .events()
            .filter(|e| matches!(e, Event::EmptyDeleted(_)))
            .collect();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].level(), Level::Info);
    }

    #[test]
    fn test_empty_femur_is_deleted_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[]));
        put(dir, "femur_right.nii.gz", &cubes(&[(10, 10, 90)]));

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();
        assert_eq!(report.references, vec![Side::Right]);
        assert_eq!(names(dir), vec!["femur_right.nii.gz"]);
    }

    #[test]
    fn test_single_reference_two_components() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        put(dir, "patella.nii.gz", &cubes(&[(10, 10, 15), (10, 10, 80)]));

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(
            names(dir),
            vec![
                "femur_left.nii.gz",
                "patella_left.nii.gz",
                "patella_right.nii.gz"
            ]
        );
        assert!((w_of(dir, "patella_left.nii.gz") - 15.0).abs() < 1e-9);
        assert!(matches!(
            report.outcome(BoneClass::Patella),
            Some(BoneOutcome::Resolved {
                confidence: Confidence::ToBeVerified,
                ..
            })
        ));
        let flagged = journal
            .events()
            .filter(|e| {
                matches!(
                    e,
                    Event::Assigned {
                        bone: BoneClass::Patella,
                        confidence: Confidence::ToBeVerified,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(flagged, 2);
    }

    #[test]
    fn test_ambiguous_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        put(dir, "femur_right.nii.gz", &cubes(&[(10, 10, 90)]));
        put(dir, "tibia.nii.gz", &cubes(&[(10, 10, 14), (10, 10, 30)]));

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(
            report.outcome(BoneClass::Tibia),
            Some(&BoneOutcome::Unresolved {
                reason: UnresolvedReason::Ambiguous
            })
        );
        assert_eq!(report.attention_count(), 1);
        assert!(names(dir).contains(&"tibia.nii.gz".to_string()));
        assert!(!names(dir).iter().any(|n| n.starts_with("tibia_")));
        assert!(journal.events().any(|e| matches!(
            e,
            Event::Unresolved {
                bone: BoneClass::Tibia,
                ..
            }
        ) && e.level() == Level::Error));
    }

    #[test]
    fn test_no_reference_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "patella.nii.gz", &cubes(&[(10, 10, 15)]));

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(
            report.outcome(BoneClass::Patella),
            Some(&BoneOutcome::Unresolved {
                reason: UnresolvedReason::NoReference
            })
        );
        assert_eq!(report.attention_count(), 0);
        assert_eq!(names(dir), vec!["patella.nii.gz"]);
        assert!(!journal
            .events()
            .any(|e| matches!(e, Event::Components { .. })));
    }

    #[test]
    fn test_prune_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        put(dir, "hip_left.nii.gz", &cubes(&[(10, 10, 50)]));
        fs::write(dir.join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.join("extra")).unwrap();

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(report.pruned.len(), 2);
        assert_eq!(names(dir), vec!["extra", "femur_left.nii.gz"]);
        let pruned = journal
            .events()
            .filter(|e| matches!(e, Event::Pruned(_)))
            .count();
        assert_eq!(pruned, 2);
    }

    #[test]
    fn test_prune_leftover_partial_save() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        put(dir, "tibia_left.nii.gz", &cubes(&[(10, 10, 12)]));
        fs::write(dir.join(".partial-x7Qa9b-tibia_left.nii.gz"), b"trunc").unwrap();

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(report.pruned.len(), 1);
        assert_eq!(names(dir), vec!["femur_left.nii.gz", "tibia_left.nii.gz"]);
    }

    #[test]
    fn test_malformed_bone_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        put(dir, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));
        fs::write(dir.join("tibia.nii.gz"), b"not a volume").unwrap();

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&NiftiStore, &mut journal)
            .process(dir)
            .unwrap();

        assert!(matches!(
            report.outcome(BoneClass::Tibia),
            Some(BoneOutcome::FormatError { .. })
        ));
        assert!(names(dir).contains(&"tibia.nii.gz".to_string()));
        assert!(journal
            .events()
            .any(|e| matches!(e, Event::Malformed { .. })));
    }

    /// 任何保存都失败的存储.
    struct ReadOnly;

    impl VolumeStore for ReadOnly {
        fn load(&self, path: &Path) -> Result<BoneMask, VolumeError> {
            NiftiStore.load(path)
        }

        fn save(&self, _mask: &BoneMask, path: &Path) -> Result<(), VolumeError> {
            Err(VolumeError::Io {
                path: path.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only"),
            })
        }

        fn delete(&self, path: &Path) -> Result<(), VolumeError> {
            NiftiStore.delete(path)
        }
    }

    #[test]
    fn test_save_failure_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        tibia_case(dir);

        let mut journal = MemoryJournal::new();
        let report = SubjectPipeline::new(&ReadOnly, &mut journal)
            .process(dir)
            .unwrap();

        assert_eq!(
            report.outcome(BoneClass::Tibia),
            Some(&BoneOutcome::SaveFailed)
        );
        assert!(names(dir).contains(&"tibia.nii.gz".to_string()));
        let failed = journal
            .events()
            .filter(|e| matches!(e, Event::SaveFailed { .. }))
            .count();
        assert_eq!(failed, 2);
    }

    #[test]
    fn test_run_root() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("case_02");
        let b = root.path().join("case_01");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        tibia_case(&a);
        put(&b, "femur_left.nii.gz", &cubes(&[(10, 10, 10)]));

        let mut journal = MemoryJournal::new();
        let summary = run_root(root.path(), &NiftiStore, &mut journal).unwrap();

        let subjects: Vec<_> = summary.subjects.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["case_01", "case_02"]);
        assert!(summary.failed.is_empty());
        // 缺失的输入不算需要人工介入.
        assert!(summary.is_clean());
        assert_eq!(journal.entries()[0].0, "case_01");
    }

    #[test]
    fn test_run_root_missing() {
        let root = tempfile::tempdir().unwrap();
        let mut journal = MemoryJournal::new();
        assert!(run_root(&root.path().join("nope"), &NiftiStore, &mut journal).is_err());
    }
}
