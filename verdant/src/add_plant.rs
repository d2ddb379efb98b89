use std::sync::Arc;

use garde::Validate;
use verdant_cache::{Mutation, QueryCache};
use verdant_core::{ClientError, FieldError, MutationResult, NewPlant, PlantForm, ResourceKey, Seller};
use verdant_events::{EventBus, Notification};
use verdant_http::{ApiClient, ImageFile, ImageUploader};
use verdant_security::IdentityProvider;

pub const PLANT_ADDED: &str = "Plant added successfully";
pub const PLANT_ADD_FAILED: &str = "Failed to add plant";

/// Listing a new plant: validate the form, upload the image, then create the
/// plant as the signed-in seller.
///
/// Steps run strictly in that order and stop at the first failure; the
/// create request is never sent before the upload has produced a URL.
#[derive(Clone)]
pub struct AddPlantFlow {
    identity: IdentityProvider,
    uploader: Arc<dyn ImageUploader>,
    events: EventBus,
    mutation: Mutation<NewPlant, MutationResult>,
}

impl AddPlantFlow {
    pub fn new(
        api: ApiClient,
        cache: QueryCache,
        uploader: Arc<dyn ImageUploader>,
        identity: IdentityProvider,
        events: EventBus,
    ) -> Self {
        let success_events = events.clone();
        let error_events = events.clone();
        let mutation = Mutation::new(move |plant: NewPlant| {
            let api = api.clone();
            async move { api.create_plant(&plant).await }
        })
        .named("add-plant")
        .validate_with(|plant: &NewPlant| plant.validate().map_err(ClientError::from))
        .on_success(move |_: Arc<MutationResult>| {
            let events = success_events.clone();
            let cache = cache.clone();
            async move {
                events.emit_and_wait(Notification::success(PLANT_ADDED)).await;
                cache.invalidate(&ResourceKey::new("plants"));
            }
        })
        .on_error(move |_| {
            let events = error_events.clone();
            async move { events.emit_and_wait(Notification::error(PLANT_ADD_FAILED)).await }
        });

        Self {
            identity,
            uploader,
            events,
            mutation,
        }
    }

    /// The underlying create mutation; gate repeated submissions on
    /// [`is_pending`](Mutation::is_pending).
    pub fn mutation(&self) -> &Mutation<NewPlant, MutationResult> {
        &self.mutation
    }

    pub fn is_pending(&self) -> bool {
        self.mutation.is_pending()
    }

    /// Run the flow. The form is cleared only when the plant was created.
    pub async fn submit(
        &self,
        form: &mut PlantForm,
        image: Option<ImageFile>,
    ) -> Result<Arc<MutationResult>, ClientError> {
        let (draft, image) = match (form.validate(), image.filter(|i| !i.is_empty())) {
            (Ok(draft), Some(image)) => (draft, image),
            (draft, image) => {
                let mut errors = draft.err().unwrap_or_default();
                if image.is_none() {
                    errors.push(FieldError::new("image", "Image is required"));
                }
                tracing::debug!(fields = errors.len(), "plant form rejected");
                return Err(ClientError::Validation(errors));
            }
        };

        let Some(principal) = self.identity.current().principal else {
            return self.fail(ClientError::Auth("Sign in to add a plant".into())).await;
        };

        let file_name = image.file_name.clone();
        let image_url = match self.uploader.upload(image).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(file = %file_name, error = %err, "image upload failed");
                return self.fail(err).await;
            }
        };

        let plant = draft.into_new_plant(image_url, Seller::from(&principal));
        let result = self.mutation.execute(plant).await?;
        form.reset();
        Ok(result)
    }

    async fn fail<T>(&self, err: ClientError) -> Result<T, ClientError> {
        self.events.emit_and_wait(Notification::error(PLANT_ADD_FAILED)).await;
        Err(err)
    }
}
