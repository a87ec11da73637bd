use super::connectivity::ConnectivityHandle;
use super::local_store::LocalStore;
use super::models::{ExpenseView, LocalExpense, PushReport, SyncState};
use super::remote::RemoteExpenseApi;
use crate::features::expenses::models::{Expense, ExpenseDraft};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::generate_expense_id;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// ローカルストアとリモートサービスの照合ロジック
///
/// 一方向・後勝ちの単純な方式で、競合解決や再試行は行わない。
pub struct Reconciler {
    store: LocalStore,
    remote: Arc<dyn RemoteExpenseApi>,
    connectivity: ConnectivityHandle,
}

impl Reconciler {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteExpenseApi>,
        connectivity: ConnectivityHandle,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivityHandle {
        &self.connectivity
    }

    /// 表示用の作業セットを組み立てる
    ///
    /// オンラインならリモート一覧と未同期のローカル変更をマージし、
    /// 取得に失敗した場合やオフラインならローカルのみから作る。
    pub async fn load_view(&self) -> AppResult<Vec<ExpenseView>> {
        if self.connectivity.is_online() {
            match self.remote.list().await {
                Ok(remote) => return self.merge(remote),
                Err(e) => self.note_failure("一覧取得", &e),
            }
        }

        self.offline_view()
    }

    fn merge(&self, remote: Vec<Expense>) -> AppResult<Vec<ExpenseView>> {
        let local = self.store.get_all()?;

        let remote_ids: HashSet<&str> = remote.iter().map(|e| e.id.as_str()).collect();
        let overrides: HashMap<&str, &LocalExpense> = local
            .iter()
            .filter(|r| matches!(r.state, SyncState::PendingUpdate | SyncState::PendingDelete))
            .map(|r| (r.expense.id.as_str(), r))
            .collect();

        let mut view: Vec<ExpenseView> = remote
            .iter()
            .filter_map(|expense| match overrides.get(expense.id.as_str()) {
                Some(local) if local.state == SyncState::PendingDelete => None,
                Some(local) => Some(ExpenseView::pending(local.expense.clone())),
                None => Some(ExpenseView::clean(expense.clone())),
            })
            .collect();

        view.extend(
            local
                .iter()
                .filter(|r| r.state.is_pending() && r.state != SyncState::PendingDelete)
                .filter(|r| !remote_ids.contains(r.expense.id.as_str()))
                .map(|r| ExpenseView::pending(r.expense.clone())),
        );

        self.store.apply_remote(&remote)?;

        log::debug!(
            "マージ完了: remote={}, view={}",
            remote.len(),
            view.len()
        );
        Ok(view)
    }

    fn offline_view(&self) -> AppResult<Vec<ExpenseView>> {
        let view = self
            .store
            .get_all()?
            .into_iter()
            .filter(|r| r.state != SyncState::PendingDelete)
            .map(|r| ExpenseView {
                pending: !r.synced(),
                expense: r.expense,
            })
            .collect();
        Ok(view)
    }

    /// 未同期のローカル変更をリモートへ送る（1回のスイープ）
    ///
    /// 失敗したレコードは保留のまま残す。通信エラーでオフラインに落として打ち切る。
    pub async fn push_pending(&self) -> AppResult<PushReport> {
        let pending: Vec<LocalExpense> = self
            .store
            .get_all()?
            .into_iter()
            .filter(|r| r.state.is_pending())
            .collect();

        let mut report = PushReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        log::info!("未同期レコードの送信を開始します: {}件", pending.len());

        for record in pending {
            let result = match record.state {
                SyncState::PendingCreate => self.push_create(&record.expense).await.map(|_| ()),
                SyncState::PendingUpdate => self.push_update(&record.expense).await.map(|_| ()),
                SyncState::PendingDelete => self.push_delete(&record.expense.id).await,
                SyncState::Clean => continue,
            };

            match result {
                Ok(()) => report.pushed += 1,
                Err(e) if e.is_transport() => {
                    report.failed += 1;
                    report.aborted = true;
                    self.note_failure("送信", &e);
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!(
                        "レコードの送信に失敗しました: id={}, state={}, error={}",
                        record.expense.id,
                        record.state,
                        e.details()
                    );
                }
            }
        }

        log::info!(
            "送信完了: 成功={}, 失敗={}, 中断={}",
            report.pushed,
            report.failed,
            report.aborted
        );
        Ok(report)
    }

    /// オンライン遷移時の処理：送信スイープの後にマージ
    pub async fn sync_on_online(&self) -> AppResult<(PushReport, Vec<ExpenseView>)> {
        let report = self.push_pending().await?;
        let view = self.load_view().await?;
        Ok((report, view))
    }

    /// 経費を作成する
    ///
    /// ローカルに PendingCreate で保存し、オンラインならリモートにも作成する。
    ///
    /// # 戻り値
    /// 作成された経費（リモートが別のIDを返した場合はそのID）
    pub async fn create(&self, draft: ExpenseDraft) -> AppResult<Expense> {
        let expense = Expense::from_draft(generate_expense_id(), draft);
        expense.validate()?;

        self.store
            .put(&LocalExpense::new(expense.clone(), SyncState::PendingCreate))?;
        log::info!("経費を作成しました: id={}", expense.id);

        if self.connectivity.is_online() {
            match self.push_create(&expense).await {
                Ok(adopted) => return Ok(adopted),
                Err(e) => self.note_failure("作成", &e),
            }
        }

        Ok(expense)
    }

    /// 経費を編集する（IDは維持）
    pub async fn edit(&self, id: &str, draft: ExpenseDraft) -> AppResult<Expense> {
        let existing = self.find_live(id)?;

        let expense = Expense::from_draft(id, draft);
        expense.validate()?;

        let state = if existing.state == SyncState::PendingCreate {
            SyncState::PendingCreate
        } else {
            SyncState::PendingUpdate
        };
        self.store.put(&LocalExpense::new(expense.clone(), state))?;
        log::info!("経費を編集しました: id={id}, state={state}");

        if self.connectivity.is_online() {
            match self.push_update(&expense).await {
                Ok(adopted) => return Ok(adopted),
                Err(e) => self.note_failure("編集", &e),
            }
        }

        Ok(expense)
    }

    /// 経費を削除する
    ///
    /// リモートに届いていない作成はローカルから即削除。それ以外は墓標を残し、
    /// オンラインならリモート削除を試みる。
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let existing = self.find_live(id)?;

        if existing.state == SyncState::PendingCreate {
            self.store.delete(id)?;
            log::info!("未送信の経費を削除しました: id={id}");
            return Ok(());
        }

        self.store.set_state(id, SyncState::PendingDelete)?;
        log::info!("経費を削除しました: id={id}");

        if self.connectivity.is_online() {
            if let Err(e) = self.push_delete(id).await {
                self.note_failure("削除", &e);
            }
        }

        Ok(())
    }

    /// 墓標を除いたローカルレコードを取得する
    fn find_live(&self, id: &str) -> AppResult<LocalExpense> {
        self.store
            .get(id)?
            .filter(|r| r.state != SyncState::PendingDelete)
            .ok_or_else(|| AppError::not_found("Expense"))
    }

    async fn push_create(&self, expense: &Expense) -> AppResult<Expense> {
        let stored = self.remote.create(expense).await?;
        self.adopt(&expense.id, stored)
    }

    /// PUTし、リモートに存在しなければPOSTする
    async fn push_update(&self, expense: &Expense) -> AppResult<Expense> {
        let stored = match self.remote.update(expense).await {
            Ok(stored) => stored,
            Err(AppError::NotFound(_)) => {
                log::debug!("リモートに存在しないため作成します: id={}", expense.id);
                self.remote.create(expense).await?
            }
            Err(e) => return Err(e),
        };
        self.adopt(&expense.id, stored)
    }

    /// 404も削除済みとして扱う
    async fn push_delete(&self, id: &str) -> AppResult<()> {
        match self.remote.delete(id).await {
            Ok(()) | Err(AppError::NotFound(_)) => {
                self.store.delete(id)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// リモートが保存したレコードを Clean として取り込む
    fn adopt(&self, local_id: &str, stored: Expense) -> AppResult<Expense> {
        if stored.id == local_id {
            self.store
                .put(&LocalExpense::new(stored.clone(), SyncState::Clean))?;
        } else {
            self.store.rekey(local_id, &stored, SyncState::Clean)?;
        }
        Ok(stored)
    }

    /// リモート失敗を記録する（通信エラーならオフラインへ）
    fn note_failure(&self, context: &str, error: &AppError) {
        if error.is_transport() {
            self.connectivity.force_offline();
            log::warn!("{context}中に通信エラー、ローカルで継続します: {}", error.details());
        } else {
            log::warn!("{context}に失敗しました: {}", error.details());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::expenses::models::Category;
    use crate::features::sync::testing::FakeRemote;
    use chrono::NaiveDate;

    fn coffee_draft() -> ExpenseDraft {
        ExpenseDraft {
            amount: 12.50,
            description: "Coffee".to_string(),
            category: Category::Food,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    fn coffee() -> Expense {
        Expense::from_draft("1", coffee_draft())
    }

    fn setup(online: bool) -> (Reconciler, Arc<FakeRemote>) {
        let remote = Arc::new(FakeRemote::default());
        let reconciler = Reconciler::new(
            LocalStore::in_memory().unwrap(),
            remote.clone(),
            ConnectivityHandle::new(online),
        );
        (reconciler, remote)
    }

    fn state_of(reconciler: &Reconciler, id: &str) -> Option<SyncState> {
        reconciler.store().get(id).unwrap().map(|r| r.state)
    }

    #[tokio::test]
    async fn test_offline_create_is_pending() {
        let (reconciler, remote) = setup(false);
        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::PendingCreate))
            .unwrap();

        let view = reconciler.load_view().await.unwrap();
        assert_eq!(view, vec![ExpenseView::pending(coffee())]);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_going_online_posts_pending_create() {
        let (reconciler, remote) = setup(false);
        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::PendingCreate))
            .unwrap();

        reconciler.connectivity().set_online(true);
        let (report, view) = reconciler.sync_on_online().await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(remote.calls(), vec!["POST 1".to_string(), "GET".to_string()]);
        assert_eq!(remote.records(), vec![coffee()]);
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::Clean));
        assert_eq!(view, vec![ExpenseView::clean(coffee())]);
    }

    #[tokio::test]
    async fn test_online_create_round_trip() {
        let (reconciler, remote) = setup(true);

        let created = reconciler.create(coffee_draft()).await.unwrap();

        assert_eq!(remote.records(), vec![created.clone()]);
        assert_eq!(state_of(&reconciler, &created.id), Some(SyncState::Clean));
    }

    #[tokio::test]
    async fn test_create_rekeys_when_remote_assigns_id() {
        let (reconciler, remote) = setup(true);
        remote.assign_ids("srv-");

        let created = reconciler.create(coffee_draft()).await.unwrap();

        assert_eq!(created.id, "srv-1");
        let local = reconciler.store().get_all().unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].expense.id, "srv-1");
        assert_eq!(local[0].state, SyncState::Clean);
    }

    #[tokio::test]
    async fn test_transport_failure_during_create_goes_offline() {
        let (reconciler, remote) = setup(true);
        remote.set_reachable(false);

        let created = reconciler.create(coffee_draft()).await.unwrap();

        assert!(!reconciler.connectivity().is_online());
        assert_eq!(
            state_of(&reconciler, &created.id),
            Some(SyncState::PendingCreate)
        );
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (reconciler, remote) = setup(true);
        remote.seed(vec![coffee()]);
        reconciler
            .store()
            .put(&LocalExpense::new(
                Expense::from_draft("local", coffee_draft()),
                SyncState::PendingCreate,
            ))
            .unwrap();

        let first = reconciler.load_view().await.unwrap();
        let second = reconciler.load_view().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(!first[0].pending);
        assert!(first[1].pending);
    }

    #[tokio::test]
    async fn test_merge_prefers_local_pending_update() {
        let (reconciler, remote) = setup(true);
        remote.seed(vec![coffee()]);

        let mut edited = coffee();
        edited.amount = 20.0;
        reconciler
            .store()
            .put(&LocalExpense::new(edited.clone(), SyncState::PendingUpdate))
            .unwrap();

        let view = reconciler.load_view().await.unwrap();
        assert_eq!(view, vec![ExpenseView::pending(edited)]);
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::PendingUpdate));
    }

    #[tokio::test]
    async fn test_merge_prunes_clean_records_missing_remotely() {
        let (reconciler, _remote) = setup(true);
        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::Clean))
            .unwrap();

        let view = reconciler.load_view().await.unwrap();
        assert!(view.is_empty());
        assert_eq!(state_of(&reconciler, "1"), None);
    }

    #[tokio::test]
    async fn test_online_delete_removes_everywhere() {
        let (reconciler, remote) = setup(true);
        remote.seed(vec![coffee()]);
        reconciler.load_view().await.unwrap();

        reconciler.delete("1").await.unwrap();

        assert!(remote.records().is_empty());
        assert_eq!(state_of(&reconciler, "1"), None);
    }

    #[tokio::test]
    async fn test_offline_delete_keeps_tombstone_until_online() {
        let (reconciler, remote) = setup(true);
        remote.seed(vec![coffee()]);
        reconciler.load_view().await.unwrap();

        reconciler.connectivity().force_offline();
        reconciler.delete("1").await.unwrap();

        assert!(reconciler.load_view().await.unwrap().is_empty());
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::PendingDelete));
        assert_eq!(remote.records(), vec![coffee()]);

        reconciler.connectivity().set_online(true);
        let (report, view) = reconciler.sync_on_online().await.unwrap();

        assert_eq!(report.pushed, 1);
        assert!(view.is_empty());
        assert!(remote.records().is_empty());
        assert_eq!(state_of(&reconciler, "1"), None);
    }

    #[tokio::test]
    async fn test_tombstone_hides_remote_record_during_merge() {
        let (reconciler, remote) = setup(true);
        remote.seed(vec![coffee()]);
        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::PendingDelete))
            .unwrap();

        assert!(reconciler.load_view().await.unwrap().is_empty());
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::PendingDelete));
    }

    #[tokio::test]
    async fn test_delete_of_unsent_create_is_local_only() {
        let (reconciler, remote) = setup(false);
        let created = reconciler.create(coffee_draft()).await.unwrap();

        reconciler.delete(&created.id).await.unwrap();

        assert!(reconciler.store().get_all().unwrap().is_empty());
        reconciler.connectivity().set_online(true);
        reconciler.sync_on_online().await.unwrap();
        assert_eq!(remote.calls(), vec!["GET".to_string()]);
    }

    #[tokio::test]
    async fn test_offline_edit_states() {
        let (reconciler, remote) = setup(false);
        let created = reconciler.create(coffee_draft()).await.unwrap();

        let mut draft = coffee_draft();
        draft.amount = 3.0;
        reconciler.edit(&created.id, draft.clone()).await.unwrap();
        assert_eq!(
            state_of(&reconciler, &created.id),
            Some(SyncState::PendingCreate)
        );

        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::Clean))
            .unwrap();
        reconciler.edit("1", draft).await.unwrap();
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::PendingUpdate));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pending_update_falls_back_to_post() {
        let (reconciler, remote) = setup(false);
        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::PendingUpdate))
            .unwrap();

        reconciler.connectivity().set_online(true);
        reconciler.push_pending().await.unwrap();

        assert_eq!(
            remote.calls(),
            vec!["PUT 1".to_string(), "POST 1".to_string()]
        );
        assert_eq!(remote.records(), vec![coffee()]);
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::Clean));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (reconciler, _remote) = setup(false);
        assert!(matches!(
            reconciler.edit("missing", coffee_draft()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            reconciler.delete("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_push_sweep_stops_on_transport_failure() {
        let (reconciler, remote) = setup(false);
        for id in ["a", "b"] {
            reconciler
                .store()
                .put(&LocalExpense::new(
                    Expense::from_draft(id, coffee_draft()),
                    SyncState::PendingCreate,
                ))
                .unwrap();
        }

        reconciler.connectivity().set_online(true);
        remote.set_reachable(false);
        let report = reconciler.push_pending().await.unwrap();

        assert_eq!(
            report,
            PushReport {
                pushed: 0,
                failed: 1,
                aborted: true
            }
        );
        assert!(!reconciler.connectivity().is_online());
        assert_eq!(state_of(&reconciler, "b"), Some(SyncState::PendingCreate));
    }

    #[tokio::test]
    async fn test_rejected_record_stays_pending() {
        let (reconciler, remote) = setup(false);
        reconciler
            .store()
            .put(&LocalExpense::new(coffee(), SyncState::PendingCreate))
            .unwrap();
        remote.reject_id("1");

        reconciler.connectivity().set_online(true);
        let report = reconciler.push_pending().await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(!report.aborted);
        assert!(reconciler.connectivity().is_online());
        assert_eq!(state_of(&reconciler, "1"), Some(SyncState::PendingCreate));
    }
}
