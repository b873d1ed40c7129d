//! The session model: atoms plus the two estimation engines.

use crate::renderer::RendererPort;
use core_estimator::Estimator;
use core_model::{DomainBundle, Question, Region, UserResponse, Video};
use core_recommend::Recommender;
use core_sampler::{CurriculumBias, SamplerInputs, Selection, curriculum, select_next,
    select_with_mode};
use core_state::{ProgressRestored, SessionAtoms, Storage};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SessionModel {
    pub atoms: SessionAtoms,
    /// Estimator for the active domain; `None` until a bundle installs.
    estimator: Option<Estimator>,
    recommender: Recommender,
    bundle: Option<Arc<DomainBundle>>,
    /// Questions from every installed bundle, keyed by id. Difficulty
    /// lookups during restore go through this index.
    question_index: HashMap<String, Question>,
    videos: Vec<Video>,
}

impl SessionModel {
    /// Build the session over a storage backend. The schema-gate outcome
    /// is surfaced so the embedding UI can notify on `Incompatible`.
    pub fn new(storage: Rc<dyn Storage>) -> (Self, ProgressRestored) {
        let (atoms, gate) = SessionAtoms::new(storage);
        let model = Self {
            atoms,
            estimator: None,
            recommender: Recommender::new(),
            bundle: None,
            question_index: HashMap::new(),
            videos: Vec::new(),
        };
        (model, gate)
    }

    pub fn active_bundle(&self) -> Option<&Arc<DomainBundle>> {
        self.bundle.as_ref()
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    pub(crate) fn recommender_mut(&mut self) -> &mut Recommender {
        &mut self.recommender
    }

    pub(crate) fn estimator_mut(&mut self) -> Option<&mut Estimator> {
        self.estimator.as_mut()
    }

    pub(crate) fn question(&self, id: &str) -> Option<&Question> {
        self.question_index.get(id)
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub(crate) fn video(&self, id: &str) -> Option<&Video> {
        self.videos.iter().find(|v| v.id == id)
    }

    /// Install the video catalog (from the loader's background fetch).
    pub fn install_videos(&mut self, videos: &[Video]) {
        self.videos = videos.to_vec();
    }

    /// Make a loaded bundle the active domain: index its questions,
    /// rebuild the domain estimator from the response history, replay the
    /// global recommender, and push the new layers through the renderer.
    /// Reached through `SessionAction::SwitchDomain` so the caller gets a
    /// `DispatchResult` like every other mutation.
    pub(crate) fn install_bundle(
        &mut self,
        bundle: Arc<DomainBundle>,
        renderer: &mut dyn RendererPort,
    ) {
        let domain = &bundle.domain.domain;
        info!(
            target: "runtime.session",
            domain = domain.id.as_str(),
            questions = bundle.questions.len(),
            "installing domain bundle"
        );

        for q in &bundle.questions {
            self.question_index.insert(q.id.clone(), q.clone());
        }

        let responses = self.atoms.responses.get();
        let mut estimator = Estimator::new(domain.grid_size, domain.region);
        let domain_responses: Vec<UserResponse> = responses
            .iter()
            .filter(|r| domain.region.contains(r.x, r.y))
            .cloned()
            .collect();
        estimator.restore(&domain_responses, None, &self.question_index);

        // The global map replays everything, whatever domain it came from.
        self.recommender.restore(&responses, &self.question_index);

        self.atoms.domain_cache.update(|cache| {
            cache.insert(domain.id.clone(), Arc::clone(&bundle));
        });
        self.atoms.active_domain.set(Some(domain.id.clone()));

        let estimates = estimator.predict(None);
        renderer.transition_to(domain.region, 600);
        renderer.set_points(&bundle.questions);
        renderer.set_labels(&bundle.labels);
        renderer.set_heatmap(&estimates, domain.region);
        self.atoms.estimates.set(Rc::new(estimates));

        self.estimator = Some(estimator);
        self.bundle = Some(bundle);
    }

    /// Region of the active domain, if any.
    pub fn active_region(&self) -> Option<Region> {
        self.bundle.as_ref().map(|b| b.domain.domain.region)
    }

    /// Rebuild both estimators from the (possibly replaced) response
    /// history, e.g. after an import. Returns whether domain estimates
    /// were republished; with no active domain only the global replay
    /// runs and the next bundle install picks the history up.
    pub(crate) fn replay_history(&mut self, renderer: &mut dyn RendererPort) -> bool {
        let responses = self.atoms.responses.get();
        self.recommender.restore(&responses, &self.question_index);

        let Some(bundle) = self.bundle.clone() else {
            return false;
        };
        let domain = &bundle.domain.domain;
        let domain_responses: Vec<UserResponse> = responses
            .iter()
            .filter(|r| domain.region.contains(r.x, r.y))
            .cloned()
            .collect();
        if let Some(estimator) = self.estimator.as_mut() {
            estimator.restore(&domain_responses, None, &self.question_index);
        }
        self.publish_estimates(renderer)
    }

    /// Pick the next question under the current mode, viewport, and
    /// curriculum bias.
    pub fn select_next_question(&self, viewport: Option<Region>) -> Option<Selection> {
        let bundle = self.bundle.as_ref()?;
        let answered = self.atoms.answered_ids();
        let estimates = self.atoms.estimates.get();
        let centrality = curriculum::centrality(bundle);
        let weight = curriculum::weight(answered.len(), self.atoms.coverage() * 100.0);

        let inputs = SamplerInputs {
            questions: &bundle.questions,
            answered: &answered,
            estimates: estimates.as_slice(),
            grid: bundle.domain.domain.grid(),
            viewport,
            curriculum: Some(CurriculumBias {
                weight,
                centrality: &centrality,
            }),
        };
        match self.atoms.question_mode.get() {
            core_model::QuestionMode::Auto => select_next(&inputs),
            mode => select_with_mode(&inputs, mode),
        }
    }

    /// Mirror the recommender's maps into their session atoms so UI
    /// subscribers see one consistent set after each dispatch.
    pub(crate) fn publish_recommender_maps(&self) {
        let rec = &self.recommender;
        self.atoms
            .questions_after_video
            .set(rec.questions_after_video());
        self.atoms
            .pre_video_snapshot
            .set(rec.pre_snapshot().map(|m| Rc::new(m.to_vec())));
        self.atoms
            .difference_map
            .set(rec.difference_map().map(|m| Rc::new(m.to_vec())));
        self.atoms
            .running_difference_map
            .set(rec.running_difference_map().map(|m| Rc::new(m.to_vec())));
    }

    /// Recompute and atomically swap the active domain's estimates.
    pub(crate) fn publish_estimates(&self, renderer: &mut dyn RendererPort) -> bool {
        let (Some(estimator), Some(bundle)) = (&self.estimator, &self.bundle) else {
            warn!(target: "runtime.session", "no active domain; estimates not published");
            return false;
        };
        let estimates = estimator.predict(None);
        renderer.set_heatmap(&estimates, bundle.domain.domain.region);
        self.atoms.estimates.set(Rc::new(estimates));
        true
    }
}
